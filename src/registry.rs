//! Pattern registry and specificity resolution.
//!
//! Patterns are bucketed into routes by method and path template. Each route
//! keeps its patterns sorted by descending specificity (stable, so equal
//! specificity keeps registration order) and resolution is a first-match scan
//! over the bucket the concrete path routes to.

use crate::error::MockError;
use crate::normalize::NormalizedRequest;
use crate::pattern::{MockPattern, Pattern, Resolver};
use crate::router::{PathRouter, PathTemplate};
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

/// All patterns registered for one method and path template.
#[derive(Debug)]
pub struct Route {
    template: PathTemplate,
    param_names: Vec<String>,
    patterns: Vec<MockPattern>,
}

impl Route {
    fn new(template: PathTemplate) -> Self {
        Self {
            param_names: template.param_names(),
            template,
            patterns: Vec::new(),
        }
    }

    pub fn template(&self) -> &PathTemplate {
        &self.template
    }

    /// Patterns in the order they are tried.
    pub fn patterns(&self) -> &[MockPattern] {
        &self.patterns
    }

    fn insert(&mut self, pattern: MockPattern) {
        self.patterns.push(pattern);
        self.patterns
            .sort_by(|a, b| b.specificity().cmp(&a.specificity()));
    }
}

/// Outcome of a successful resolution.
#[derive(Clone)]
pub struct Resolution {
    pub resolver: Resolver,
    /// Path parameters bound by the route template
    pub params: BTreeMap<String, String>,
    /// Template of the matched route
    pub route: String,
    pub specificity: usize,
}

impl std::fmt::Debug for Resolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Resolution")
            .field("params", &self.params)
            .field("route", &self.route)
            .field("specificity", &self.specificity)
            .finish_non_exhaustive()
    }
}

/// Registered mock patterns, indexed by method and path template.
///
/// `routes` is the source of truth, keyed by method and canonical template
/// key. `routers` holds one compiled tree per method whose values are those
/// keys; it is rebuilt for a method whenever one of its routes is removed.
#[derive(Debug, Default)]
pub struct Registry {
    routes: HashMap<String, HashMap<String, Route>>,
    routers: HashMap<String, PathRouter<String>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a pattern, expanding list-valued methods and paths.
    ///
    /// Returns the number of (method, path) pairs registered.
    pub fn register(&mut self, pattern: &Pattern, resolver: Option<Resolver>) -> Result<usize, MockError> {
        let pairs = pattern.expand()?;
        let resolver =
            resolver.ok_or_else(|| MockError::configuration("The resolver function is not defined"))?;

        let count = pairs.len();
        for (method, path) in pairs {
            self.insert(MockPattern::new(method, path, pattern, resolver.clone()));
        }
        Ok(count)
    }

    fn insert(&mut self, pattern: MockPattern) {
        let template = PathTemplate::parse(&pattern.path);
        let key = template.key();
        debug!(
            method = %pattern.method,
            path = %template,
            specificity = pattern.specificity(),
            "Registering mock pattern"
        );

        let routes = self.routes.entry(pattern.method.clone()).or_default();
        if !routes.contains_key(&key) {
            self.routers
                .entry(pattern.method.clone())
                .or_default()
                .insert(&template, key.clone());
        }
        routes
            .entry(key)
            .or_insert_with(|| Route::new(template))
            .insert(pattern);
    }

    /// Route registered for exactly this method and path template
    /// (parameter names are not compared).
    pub fn lookup(&self, method: &str, path: &str) -> Option<&Route> {
        self.routes
            .get(&method.to_ascii_uppercase())?
            .get(&PathTemplate::parse(path).key())
    }

    /// Remove every route the pattern's method and path expand to, whatever
    /// their body or querystring constraints.
    ///
    /// Returns the number of patterns removed.
    pub fn remove(&mut self, pattern: &Pattern) -> Result<usize, MockError> {
        let mut removed = 0;
        for (method, path) in pattern.expand()? {
            let template = PathTemplate::parse(&path);
            let route = self
                .routes
                .get_mut(&method)
                .and_then(|routes| routes.remove(&template.key()));
            if let Some(route) = route {
                debug!(method = %method, path = %template, "Removed mock route");
                removed += route.patterns.len();
                self.rebuild(&method);
            }
        }
        Ok(removed)
    }

    /// Recompile the tree of one method from its remaining routes.
    fn rebuild(&mut self, method: &str) {
        if self.routes.get(method).map_or(true, HashMap::is_empty) {
            self.routes.remove(method);
            self.routers.remove(method);
            return;
        }

        let mut router = PathRouter::new();
        if let Some(routes) = self.routes.get(method) {
            for (key, route) in routes {
                router.insert(&route.template, key.clone());
            }
        }
        self.routers.insert(method.to_string(), router);
    }

    /// Drop every registered pattern.
    pub fn clear(&mut self) {
        debug!("Clearing all mock patterns");
        self.routes.clear();
        self.routers.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Find the most specific pattern matching a normalized request.
    ///
    /// `None` covers both "no route for this method and path" and "route
    /// exists but no pattern's constraints hold".
    pub fn resolve(&self, request: &NormalizedRequest) -> Option<Resolution> {
        let method = request.method.to_ascii_uppercase();
        let found = self.routers.get(&method)?.find(&request.path)?;
        let route = self.routes.get(&method)?.get(found.value)?;

        let Some(pattern) = route.patterns.iter().find(|p| p.matches(request)) else {
            debug!(
                route = %route.template,
                candidates = route.patterns.len(),
                "Route found but no pattern constraints matched"
            );
            return None;
        };

        Some(Resolution {
            resolver: pattern.resolver().clone(),
            params: route.param_names.iter().cloned().zip(found.params).collect(),
            route: route.template.to_string(),
            specificity: pattern.specificity(),
        })
    }
}
