// Screens and the sign-in guard evaluated on every navigation.

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Route {
    SignIn,
    /// Completing an OAuth redirect.
    AuthCallback,
    Dashboard,
    Notes,
    Flashcards,
    Tutor,
}

impl Route {
    /// Pages reachable without a session.
    pub fn is_public(self) -> bool {
        matches!(self, Route::SignIn | Route::AuthCallback)
    }

    pub fn title(self) -> &'static str {
        match self {
            Route::SignIn => "Sign in",
            Route::AuthCallback => "Signing in",
            Route::Dashboard => "Dashboard",
            Route::Notes => "Notes",
            Route::Flashcards => "Flashcards",
            Route::Tutor => "AI Tutor",
        }
    }

    /// Protected pages in sidebar order.
    pub const NAVIGATION: [Route; 4] = [
        Route::Dashboard,
        Route::Notes,
        Route::Flashcards,
        Route::Tutor,
    ];
}

/// Where a navigation to `route` actually lands.
///
/// Signed-in users are sent from public pages to the dashboard; everyone else
/// is sent from protected pages to sign-in.
pub fn guard(route: Route, authenticated: bool) -> Route {
    match (route.is_public(), authenticated) {
        (true, true) => Route::Dashboard,
        (false, false) => Route::SignIn,
        _ => route,
    }
}
