macro_rules! v1_path {
    ($path:literal) => {
        concat!("/api/v1", $path)
    };
}

/// Versioned API routes shared by the server and its clients
pub mod v1 {
    pub const ROOT: &str = "/api/v1";
    pub const VERSION: &str = "v1";

    pub mod trips {
        pub const COLLECTION: &str = v1_path!("/trips");
        pub const ITEM: &str = v1_path!("/trips/{id}");
        pub const POSITION: &str = v1_path!("/trips/{id}/position");
        pub const ARRIVE: &str = v1_path!("/trips/{id}/arrive");
        pub const DEPART: &str = v1_path!("/trips/{id}/depart");
        pub const END: &str = v1_path!("/trips/{id}/end");
        pub const STOPS: &str = v1_path!("/trips/{id}/stops");
        pub const STOP: &str = v1_path!("/trips/{id}/stops/{stop_id}");
        pub const LIVE: &str = v1_path!("/trips/{id}/live");
    }

    pub mod signals {
        pub const WAIT: &str = v1_path!("/trips/{id}/wait");
        pub const ABSENT: &str = v1_path!("/trips/{id}/absent");
    }

    pub mod carriers {
        pub const ACTIVE_TRIP: &str = v1_path!("/carriers/{id}/trip");
    }
}

pub const HEALTH: &str = "/health";

pub mod utils {
    /// Substitute a `{param}` placeholder.
    pub fn replace_param(
        route: &str,
        param: &str,
        value: impl AsRef<str>,
    ) -> String {
        route.replace(param, value.as_ref())
    }

    pub fn replace_params<I, K, V>(route: &str, params: I) -> String
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut path = route.to_string();
        for (param, value) in params {
            path = path.replace(param.as_ref(), value.as_ref());
        }
        path
    }
}
