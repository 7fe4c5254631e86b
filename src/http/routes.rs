use axum::Router;
use crate::app::AppContext;

/// A group of routes mounted together under an optional prefix.
///
/// Handlers reach shared services through `State<AppContext>`; state is
/// applied once by [`App`](crate::App) after every module is registered.
pub trait RouteModule {
    /// Routes of this module, without state applied.
    fn routes(&self) -> Router<AppContext>;

    /// Path prefix for all routes in this module.
    fn prefix(&self) -> Option<&str> {
        None
    }

    /// Mount this module into `router`.
    ///
    /// Routes keep their trailing slash: `/` under `/plans` serves `/plans/`.
    fn register(self, router: Router<AppContext>) -> Router<AppContext>
    where
        Self: Sized,
    {
        let routes = self.routes();

        match self.prefix() {
            Some(prefix) => router.nest(&format!("{}/", prefix.trim_end_matches('/')), routes),
            None => router.merge(routes),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::get;
    use axum::routing;

    struct Widgets;

    impl RouteModule for Widgets {
        fn routes(&self) -> Router<AppContext> {
            Router::new()
                .route("/", routing::get(|| async { "list" }))
                .route("/{id}/", routing::get(|| async { "one" }))
        }

        fn prefix(&self) -> Option<&str> {
            Some("/widgets")
        }
    }

    #[tokio::test]
    async fn test_prefixed_routes_keep_trailing_slash() {
        let world = crate::testing::TestWorld::new().await;
        let app = Widgets.register(Router::new()).with_state(world.context.clone());

        get(app.clone(), "/widgets/").execute().await.assert_ok();
        get(app, "/widgets/7/").execute().await.assert_ok();
    }
}
