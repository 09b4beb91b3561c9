//! Route descriptor table.
//!
//! DESIGN
//! ======
//! The table is fixed at startup and never mutated. Construction validates
//! it once (unique paths, landing routes present, no guest-only route that
//! also requires auth) and normalizes `requires_admin` to imply
//! `requires_auth`, so the guard can trust every descriptor it reads.

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::location::Location;

/// Default destination for visitors without a session.
pub const PUBLIC_LANDING: &str = "/";

/// Default destination after authentication.
pub const AUTHENTICATED_LANDING: &str = "/dashboard";

#[derive(Debug, thiserror::Error)]
pub enum RouteTableError {
    #[error("duplicate route path: {0}")]
    DuplicatePath(String),
    #[error("route path must start with '/': {0}")]
    InvalidPath(String),
    #[error("route {0} cannot be both guest-only and auth-required")]
    ConflictingAccess(String),
    #[error("landing route {0} is not in the table")]
    MissingLanding(String),
    #[error("failed to read route file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse route file: {0}")]
    Parse(#[from] serde_yaml::Error),
}

/// Access requirements for one path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteDescriptor {
    pub path: String,
    pub name: String,
    #[serde(default)]
    pub requires_auth: bool,
    #[serde(default)]
    pub requires_admin: bool,
    #[serde(default)]
    pub guest_only: bool,
}

impl RouteDescriptor {
    fn new(path: &str, name: &str) -> Self {
        Self {
            path: path.to_owned(),
            name: name.to_owned(),
            requires_auth: false,
            requires_admin: false,
            guest_only: false,
        }
    }

    fn guest(mut self) -> Self {
        self.guest_only = true;
        self
    }

    fn auth(mut self) -> Self {
        self.requires_auth = true;
        self
    }

    fn admin(mut self) -> Self {
        self.requires_auth = true;
        self.requires_admin = true;
        self
    }
}

/// On-disk YAML shape.
#[derive(Debug, Deserialize)]
struct RouteFile {
    #[serde(default = "default_public_landing")]
    public_landing: String,
    #[serde(default = "default_authenticated_landing")]
    authenticated_landing: String,
    routes: Vec<RouteDescriptor>,
}

fn default_public_landing() -> String {
    PUBLIC_LANDING.to_owned()
}

fn default_authenticated_landing() -> String {
    AUTHENTICATED_LANDING.to_owned()
}

/// Validated, immutable route table.
#[derive(Debug, Clone)]
pub struct RouteTable {
    routes: Vec<RouteDescriptor>,
    public_landing: String,
    authenticated_landing: String,
}

impl RouteTable {
    /// Validate and normalize a set of descriptors.
    ///
    /// # Errors
    ///
    /// Returns an error on duplicate or malformed paths, conflicting access
    /// flags, or a landing route missing from the table.
    pub fn new(
        routes: Vec<RouteDescriptor>,
        public_landing: &str,
        authenticated_landing: &str,
    ) -> Result<Self, RouteTableError> {
        let mut seen = HashSet::new();
        let mut normalized = Vec::with_capacity(routes.len());
        for mut route in routes {
            if !route.path.starts_with('/') {
                return Err(RouteTableError::InvalidPath(route.path));
            }
            route.path = Location::from_path(&route.path).path;
            if !seen.insert(route.path.clone()) {
                return Err(RouteTableError::DuplicatePath(route.path));
            }
            if route.requires_admin {
                route.requires_auth = true;
            }
            if route.guest_only && route.requires_auth {
                return Err(RouteTableError::ConflictingAccess(route.path));
            }
            normalized.push(route);
        }

        for landing in [public_landing, authenticated_landing] {
            if !seen.contains(landing) {
                return Err(RouteTableError::MissingLanding(landing.to_owned()));
            }
        }

        Ok(Self {
            routes: normalized,
            public_landing: public_landing.to_owned(),
            authenticated_landing: authenticated_landing.to_owned(),
        })
    }

    /// Parse a YAML route file body.
    ///
    /// # Errors
    ///
    /// Returns an error if the YAML is malformed or the table is invalid.
    pub fn from_yaml(body: &str) -> Result<Self, RouteTableError> {
        let file: RouteFile = serde_yaml::from_str(body)?;
        Self::new(file.routes, &file.public_landing, &file.authenticated_landing)
    }

    /// Load a YAML route file from disk.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or fails validation.
    pub fn load(path: &Path) -> Result<Self, RouteTableError> {
        let body = std::fs::read_to_string(path)?;
        Self::from_yaml(&body)
    }

    /// Descriptor for `path`, or `None` when the catch-all applies.
    #[must_use]
    pub fn lookup(&self, path: &str) -> Option<&RouteDescriptor> {
        let path = Location::from_path(path).path;
        self.routes.iter().find(|r| r.path == path)
    }

    #[must_use]
    pub fn public_landing(&self) -> &str {
        &self.public_landing
    }

    #[must_use]
    pub fn authenticated_landing(&self) -> &str {
        &self.authenticated_landing
    }

    pub fn iter(&self) -> impl Iterator<Item = &RouteDescriptor> {
        self.routes.iter()
    }
}

impl Default for RouteTable {
    fn default() -> Self {
        Self {
            routes: vec![
                RouteDescriptor::new("/", "Login").guest(),
                RouteDescriptor::new("/signup", "Signup").guest(),
                RouteDescriptor::new("/dashboard", "Dashboard").auth(),
                RouteDescriptor::new("/settings", "Settings").auth(),
                RouteDescriptor::new("/aboutus", "AboutUs").auth(),
                RouteDescriptor::new("/destinations", "Destinations").admin(),
            ],
            public_landing: PUBLIC_LANDING.to_owned(),
            authenticated_landing: AUTHENTICATED_LANDING.to_owned(),
        }
    }
}

#[cfg(test)]
#[path = "routes_test.rs"]
mod tests;
