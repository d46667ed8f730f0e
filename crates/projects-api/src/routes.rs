//! Route table for the projects API.
//!
//! The table is built once at startup and handed to
//! [`crate::handlers::create_router`]. Every pattern is also served with a
//! trailing slash.

use axum::http::Method;
use std::collections::BTreeMap;

/// What a route does
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    /// Describe the available routes
    ListRoutes,
    /// List every project
    ListProjects,
    /// Read one project
    ReadProject,
    /// Create a project
    CreateProject,
    /// Update a project
    UpdateProject,
    /// Delete a project
    DeleteProject,
    /// Acknowledge a snapshot request
    Snapshot,
}

/// One (method, pattern, endpoint) entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    /// Route name, for listings and logs
    pub name: &'static str,
    /// HTTP method
    pub method: Method,
    /// Path pattern in axum syntax, without trailing slash
    pub pattern: &'static str,
    /// Handler the route dispatches to
    pub endpoint: Endpoint,
}

impl Route {
    fn new(name: &'static str, method: Method, pattern: &'static str, endpoint: Endpoint) -> Self {
        Self {
            name,
            method,
            pattern,
            endpoint,
        }
    }

    /// Every path this route answers on
    pub fn paths(&self) -> Vec<String> {
        if self.pattern == "/" {
            vec![self.pattern.to_string()]
        } else {
            vec![self.pattern.to_string(), format!("{}/", self.pattern)]
        }
    }
}

/// The API's routes
pub fn default_routes() -> Vec<Route> {
    vec![
        Route::new("ListRoutes", Method::GET, "/", Endpoint::ListRoutes),
        Route::new("ListProjects", Method::GET, "/projects", Endpoint::ListProjects),
        Route::new("ReadProject", Method::GET, "/projects/:name", Endpoint::ReadProject),
        Route::new("CreateProject", Method::POST, "/projects", Endpoint::CreateProject),
        Route::new("UpdateProject", Method::POST, "/projects/:name", Endpoint::UpdateProject),
        Route::new("DeleteProject", Method::DELETE, "/projects/:name", Endpoint::DeleteProject),
        Route::new("SnapshotDB", Method::POST, "/snapshot", Endpoint::Snapshot),
    ]
}

/// Pattern -> accepted methods, as served by `GET /`
pub fn route_listing(routes: &[Route]) -> BTreeMap<String, Vec<String>> {
    let mut listing: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for route in routes {
        let methods = listing.entry(route.pattern.to_string()).or_default();
        let method = route.method.to_string();
        if !methods.contains(&method) {
            methods.push(method);
        }
    }
    listing
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_endpoint_routed_once() {
        let routes = default_routes();
        for endpoint in [
            Endpoint::ListRoutes,
            Endpoint::ListProjects,
            Endpoint::ReadProject,
            Endpoint::CreateProject,
            Endpoint::UpdateProject,
            Endpoint::DeleteProject,
            Endpoint::Snapshot,
        ] {
            assert_eq!(routes.iter().filter(|r| r.endpoint == endpoint).count(), 1);
        }
    }

    #[test]
    fn test_no_duplicate_method_and_pattern() {
        let routes = default_routes();
        for (i, a) in routes.iter().enumerate() {
            for b in &routes[i + 1..] {
                assert!(!(a.method == b.method && a.pattern == b.pattern));
            }
        }
    }

    #[test]
    fn test_paths_include_trailing_slash() {
        let route = Route::new("ReadProject", Method::GET, "/projects/:name", Endpoint::ReadProject);
        assert_eq!(route.paths(), vec!["/projects/:name", "/projects/:name/"]);

        let root = Route::new("ListRoutes", Method::GET, "/", Endpoint::ListRoutes);
        assert_eq!(root.paths(), vec!["/"]);
    }

    #[test]
    fn test_route_listing() {
        let listing = route_listing(&default_routes());
        assert_eq!(listing["/projects"], vec!["GET", "POST"]);
        assert_eq!(listing["/projects/:name"], vec!["GET", "POST", "DELETE"]);
        assert_eq!(listing["/snapshot"], vec!["POST"]);
    }
}
