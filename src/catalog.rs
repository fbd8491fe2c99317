//! Named search-client operations.
//!
//! Maps an operation name such as `search` or `indices.create` to the HTTP
//! methods and path templates the client uses for it, so a pattern can be
//! registered by name instead of spelling every route out.

/// Methods and path templates used by one client operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ApiEndpoint {
    pub name: &'static str,
    pub methods: &'static [&'static str],
    pub paths: &'static [&'static str],
}

const ENDPOINTS: &[ApiEndpoint] = &[
    ApiEndpoint {
        name: "info",
        methods: &["GET"],
        paths: &["/"],
    },
    ApiEndpoint {
        name: "ping",
        methods: &["HEAD"],
        paths: &["/"],
    },
    ApiEndpoint {
        name: "search",
        methods: &["GET", "POST"],
        paths: &["/_search", "/:index/_search"],
    },
    ApiEndpoint {
        name: "count",
        methods: &["GET", "POST"],
        paths: &["/_count", "/:index/_count"],
    },
    ApiEndpoint {
        name: "msearch",
        methods: &["GET", "POST"],
        paths: &["/_msearch", "/:index/_msearch"],
    },
    ApiEndpoint {
        name: "bulk",
        methods: &["POST", "PUT"],
        paths: &["/_bulk", "/:index/_bulk"],
    },
    ApiEndpoint {
        name: "index",
        methods: &["PUT", "POST"],
        paths: &["/:index/_doc/:id", "/:index/_doc"],
    },
    ApiEndpoint {
        name: "create",
        methods: &["PUT", "POST"],
        paths: &["/:index/_create/:id"],
    },
    ApiEndpoint {
        name: "get",
        methods: &["GET"],
        paths: &["/:index/_doc/:id"],
    },
    ApiEndpoint {
        name: "exists",
        methods: &["HEAD"],
        paths: &["/:index/_doc/:id"],
    },
    ApiEndpoint {
        name: "delete",
        methods: &["DELETE"],
        paths: &["/:index/_doc/:id"],
    },
    ApiEndpoint {
        name: "update",
        methods: &["POST"],
        paths: &["/:index/_update/:id"],
    },
    ApiEndpoint {
        name: "mget",
        methods: &["GET", "POST"],
        paths: &["/_mget", "/:index/_mget"],
    },
    ApiEndpoint {
        name: "scroll",
        methods: &["GET", "POST"],
        paths: &["/_search/scroll", "/_search/scroll/:scroll_id"],
    },
    ApiEndpoint {
        name: "clear_scroll",
        methods: &["DELETE"],
        paths: &["/_search/scroll", "/_search/scroll/:scroll_id"],
    },
    ApiEndpoint {
        name: "delete_by_query",
        methods: &["POST"],
        paths: &["/:index/_delete_by_query"],
    },
    ApiEndpoint {
        name: "update_by_query",
        methods: &["POST"],
        paths: &["/:index/_update_by_query"],
    },
    ApiEndpoint {
        name: "indices.create",
        methods: &["PUT"],
        paths: &["/:index"],
    },
    ApiEndpoint {
        name: "indices.delete",
        methods: &["DELETE"],
        paths: &["/:index"],
    },
    ApiEndpoint {
        name: "indices.exists",
        methods: &["HEAD"],
        paths: &["/:index"],
    },
    ApiEndpoint {
        name: "indices.refresh",
        methods: &["GET", "POST"],
        paths: &["/_refresh", "/:index/_refresh"],
    },
    ApiEndpoint {
        name: "cluster.health",
        methods: &["GET"],
        paths: &["/_cluster/health", "/_cluster/health/:index"],
    },
    ApiEndpoint {
        name: "cat.indices",
        methods: &["GET"],
        paths: &["/_cat/indices", "/_cat/indices/:index"],
    },
];

/// Find an operation by name.
pub fn lookup(name: &str) -> Option<&'static ApiEndpoint> {
    ENDPOINTS.iter().find(|endpoint| endpoint.name == name)
}

/// All known operations.
pub fn endpoints() -> &'static [ApiEndpoint] {
    ENDPOINTS
}
