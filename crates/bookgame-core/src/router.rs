//! Overlay page navigation, independent of the AR scene.

use crate::context::Context;
use crate::error::AppError;
use crate::event::AppEvent;
use crate::mode::{ModeEvent, ModeManager};
use crate::state::{ErrorInfo, Mode, Page, Route, RouteParam};

/// A page named either by its enum value or by its URL slug.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageRef {
    Page(Page),
    Slug(String),
}

impl From<Page> for PageRef {
    fn from(page: Page) -> Self {
        PageRef::Page(page)
    }
}

impl From<&str> for PageRef {
    fn from(slug: &str) -> Self {
        PageRef::Slug(slug.to_string())
    }
}

impl From<String> for PageRef {
    fn from(slug: String) -> Self {
        PageRef::Slug(slug)
    }
}

#[derive(Debug, Clone)]
pub struct RouterManager {
    ctx: Context,
    modes: ModeManager,
}

impl RouterManager {
    pub fn new(ctx: Context, modes: ModeManager) -> Self {
        Self { ctx, modes }
    }

    pub fn current(&self) -> Option<Route> {
        self.ctx.state().current_route.clone()
    }

    /// Show a page. Unknown slugs land on [`Page::NotFound`]. Returns
    /// whether the route changed.
    pub fn navigate(&self, page: impl Into<PageRef>, param: Option<RouteParam>) -> bool {
        let route = self.resolve(page.into(), param);
        if self.ctx.state().current_route.as_ref() == Some(&route) {
            tracing::trace!(page = ?route.page, "already on route");
            return false;
        }

        if self.modes.current() == Mode::Qr {
            self.modes.dispatch(ModeEvent::StopQrScan);
        }

        let next = route.clone();
        self.ctx.store.update(move |s| s.current_route = Some(next));
        tracing::debug!(page = route.page.slug(), "navigated");
        self.ctx.emit(AppEvent::RouteChanged { route: Some(route) });
        true
    }

    /// Show the error page with the message as its parameter.
    pub fn show_error(&self, info: &ErrorInfo) -> bool {
        tracing::error!(kind = ?info.kind, message = %info.message, "showing error page");
        self.navigate(
            Page::Error,
            Some(RouteParam::new("message", info.message.clone())),
        )
    }

    /// Close the overlay and return to the scene.
    pub fn close(&self) -> bool {
        if self.ctx.state().current_route.is_none() {
            return false;
        }
        self.ctx.store.update(|s| s.current_route = None);
        self.ctx.emit(AppEvent::RouteChanged { route: None });
        true
    }

    fn resolve(&self, page: PageRef, param: Option<RouteParam>) -> Route {
        match page {
            PageRef::Page(page) => Route { page, param },
            PageRef::Slug(slug) => match Page::from_slug(&slug) {
                Some(page) => Route { page, param },
                None => {
                    self.ctx.errors.log(&AppError::RouteNotFound { path: slug.clone() });
                    Route::with_param(Page::NotFound, RouteParam::new("path", slug))
                }
            },
        }
    }
}
