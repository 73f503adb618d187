//! Event dispatch
//!
//! The hosting application registers one async handler per event kind and
//! feeds events through `EventDispatcher::dispatch`. Unhandled fetch events
//! pass through to the network; other unhandled events are reported as
//! such.

use crate::error::CacheResult;
use crate::lifecycle::{ActivationReport, FetchOutcome, InstallReport, LifecycleController};
use crate::message::{Command, Reply};
use crate::request::Request;
use futures_util::future::{BoxFuture, FutureExt};
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use tracing::debug;

type Handler<In, Out> = Box<dyn Fn(In) -> BoxFuture<'static, Out> + Send + Sync>;

/// Event delivered to the dispatcher
#[derive(Debug, Clone)]
pub enum Event {
    Install,
    Activate,
    Fetch(Request),
    Message(Command),
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Install => write!(f, "install"),
            Self::Activate => write!(f, "activate"),
            Self::Fetch(request) => write!(f, "fetch {} {}", request.method(), request.key()),
            Self::Message(_) => write!(f, "message"),
        }
    }
}

/// What a handler produced
#[derive(Debug, Clone)]
pub enum EventOutcome {
    Installed(InstallReport),
    Activated(ActivationReport),
    Fetched(FetchOutcome),
    Replied(Reply),
    /// No handler registered for the event kind
    Unhandled,
}

/// Typed handler registry
#[derive(Default)]
pub struct EventDispatcher {
    install: Option<Handler<(), CacheResult<InstallReport>>>,
    activate: Option<Handler<(), CacheResult<ActivationReport>>>,
    fetch: Option<Handler<Request, CacheResult<FetchOutcome>>>,
    message: Option<Handler<Command, Reply>>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_install<F, Fut>(&mut self, handler: F) -> &mut Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = CacheResult<InstallReport>> + Send + 'static,
    {
        self.install = Some(Box::new(move |()| handler().boxed()));
        self
    }

    pub fn on_activate<F, Fut>(&mut self, handler: F) -> &mut Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = CacheResult<ActivationReport>> + Send + 'static,
    {
        self.activate = Some(Box::new(move |()| handler().boxed()));
        self
    }

    pub fn on_fetch<F, Fut>(&mut self, handler: F) -> &mut Self
    where
        F: Fn(Request) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = CacheResult<FetchOutcome>> + Send + 'static,
    {
        self.fetch = Some(Box::new(move |request| handler(request).boxed()));
        self
    }

    pub fn on_message<F, Fut>(&mut self, handler: F) -> &mut Self
    where
        F: Fn(Command) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Reply> + Send + 'static,
    {
        self.message = Some(Box::new(move |command| handler(command).boxed()));
        self
    }

    /// Deliver an event to its handler
    pub async fn dispatch(&self, event: Event) -> CacheResult<EventOutcome> {
        debug!("Dispatching {}", event);
        match event {
            Event::Install => match &self.install {
                Some(handler) => handler(()).await.map(EventOutcome::Installed),
                None => Ok(EventOutcome::Unhandled),
            },
            Event::Activate => match &self.activate {
                Some(handler) => handler(()).await.map(EventOutcome::Activated),
                None => Ok(EventOutcome::Unhandled),
            },
            Event::Fetch(request) => match &self.fetch {
                Some(handler) => handler(request).await.map(EventOutcome::Fetched),
                None => Ok(EventOutcome::Fetched(FetchOutcome::PassThrough)),
            },
            Event::Message(command) => match &self.message {
                Some(handler) => Ok(EventOutcome::Replied(handler(command).await)),
                None => Ok(EventOutcome::Unhandled),
            },
        }
    }
}

impl LifecycleController {
    /// Register this controller's handlers for every event kind
    pub fn register(self: &Arc<Self>, dispatcher: &mut EventDispatcher) {
        let controller = self.clone();
        dispatcher.on_install(move || {
            let controller = controller.clone();
            async move { controller.on_install().await }
        });

        let controller = self.clone();
        dispatcher.on_activate(move || {
            let controller = controller.clone();
            async move { controller.on_activate().await }
        });

        let controller = self.clone();
        dispatcher.on_fetch(move |request| {
            let controller = controller.clone();
            async move { controller.on_fetch(&request).await }
        });

        let controller = self.clone();
        dispatcher.on_message(move |command| {
            let controller = controller.clone();
            async move { controller.handle_message(command).await }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SystemClock;
    use crate::lifecycle::{InstallPlan, WorkerState};
    use crate::network::OfflineFetcher;
    use crate::request::{Destination, Method};
    use crate::store::{CacheStorage, MemoryStorage};

    fn registered() -> (EventDispatcher, Arc<LifecycleController>) {
        let storage: Arc<dyn CacheStorage> = Arc::new(MemoryStorage::new());
        let controller = Arc::new(
            LifecycleController::new(
                "v1",
                storage,
                Arc::new(OfflineFetcher),
                Arc::new(SystemClock),
                InstallPlan::default(),
            )
            .unwrap(),
        );
        let mut dispatcher = EventDispatcher::new();
        controller.register(&mut dispatcher);
        (dispatcher, controller)
    }

    #[tokio::test]
    async fn empty_dispatcher_passes_fetch_through() {
        let dispatcher = EventDispatcher::new();
        let request = Request::get("https://book.example/").unwrap();

        match dispatcher.dispatch(Event::Fetch(request)).await.unwrap() {
            EventOutcome::Fetched(FetchOutcome::PassThrough) => {}
            other => panic!("unexpected outcome {:?}", other),
        }
        assert!(matches!(
            dispatcher.dispatch(Event::Install).await.unwrap(),
            EventOutcome::Unhandled
        ));
    }

    #[tokio::test]
    async fn lifecycle_through_dispatcher() {
        let (dispatcher, controller) = registered();

        // Empty manifest: install trivially succeeds even offline
        assert!(matches!(
            dispatcher.dispatch(Event::Install).await.unwrap(),
            EventOutcome::Installed(_)
        ));
        assert!(matches!(
            dispatcher.dispatch(Event::Activate).await.unwrap(),
            EventOutcome::Activated(_)
        ));
        assert_eq!(controller.state().await, WorkerState::Active);
    }

    #[tokio::test]
    async fn fetch_event_reaches_controller() {
        let (dispatcher, _controller) = registered();

        let image = Request::get("https://book.example/p/1.gif")
            .unwrap()
            .with_destination(Destination::Image);
        match dispatcher.dispatch(Event::Fetch(image)).await.unwrap() {
            EventOutcome::Fetched(FetchOutcome::Respond(response)) => assert!(response.is_fallback()),
            other => panic!("unexpected outcome {:?}", other),
        }

        let post = Request::new(Method::Post, "https://book.example/api/share").unwrap();
        assert!(matches!(
            dispatcher.dispatch(Event::Fetch(post)).await.unwrap(),
            EventOutcome::Fetched(FetchOutcome::PassThrough)
        ));
    }

    #[tokio::test]
    async fn message_event_gets_reply() {
        let (dispatcher, _controller) = registered();

        match dispatcher
            .dispatch(Event::Message(Command::GetCacheSize))
            .await
            .unwrap()
        {
            EventOutcome::Replied(reply) => assert_eq!(reply, Reply::Usage(None)),
            other => panic!("unexpected outcome {:?}", other),
        }
    }
}
