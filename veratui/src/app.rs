//! Event loop tying the session, the fetch dispatcher and the terminal.

use chrono::Utc;
use crossterm::event::{self, Event};
use log::{debug, info};
use std::time::Duration;

use crate::error::Result;
use crate::fetch::FetchDispatcher;
use crate::input::map_key;
use crate::session::Session;
use crate::terminal::Tui;
use crate::view;

/// How long to wait for a key before checking for completions again.
pub const TICK_RATE: Duration = Duration::from_millis(100);

/// Send issued fetches to the dispatcher and apply every finished one.
///
/// Returns the number of completions applied, stale ones excluded.
pub fn pump(session: &mut Session, dispatcher: &mut FetchDispatcher) -> usize {
    for request in session.drain_requests() {
        dispatcher.submit(request);
    }
    let mut applied = 0;
    while let Some(completion) = dispatcher.try_recv() {
        if session.apply(completion) {
            applied += 1;
        }
    }
    // Completions can issue follow-up fetches, such as the refetch after an annotation.
    for request in session.drain_requests() {
        dispatcher.submit(request);
    }
    applied
}

/// Run until the operator quits.
pub async fn run(
    tui: &mut Tui,
    session: &mut Session,
    dispatcher: &mut FetchDispatcher,
) -> Result<()> {
    info!("Entering event loop");
    while !session.should_quit() {
        pump(session, dispatcher);
        tui.draw(&view::build(session, Utc::now()))?;

        if event::poll(TICK_RATE)? {
            match event::read()? {
                Event::Key(key) => {
                    if let Some(intent) = map_key(session, key) {
                        debug!("Key {:?} -> {intent:?}", key.code);
                        session.handle(intent);
                    }
                }
                Event::Resize(width, height) => debug!("Terminal resized to {width}x{height}"),
                _ => {}
            }
        } else {
            tokio::task::yield_now().await;
        }
    }
    info!("Leaving event loop");
    Ok(())
}

#[cfg(test)]
#[allow(clippy::expect_used)]
mod tests {
    use super::*;
    use crate::fetch::Backend;
    use crate::session::{FetchOutcome, FetchRequest};
    use async_trait::async_trait;
    use std::sync::Arc;
    use veracode_api::{PageMetadata, PagedResource, Principal, VeracodeError};

    struct EmptyBackend;

    #[async_trait]
    impl Backend for EmptyBackend {
        async fn execute(
            &self,
            request: FetchRequest,
        ) -> std::result::Result<FetchOutcome, VeracodeError> {
            Ok(match request {
                FetchRequest::Principal { .. } => {
                    FetchOutcome::Identity(crate::session::Identity {
                        principal: Principal::default(),
                        credentials: None,
                    })
                }
                _ => FetchOutcome::Applications(PagedResource::new(
                    Vec::new(),
                    PageMetadata::default(),
                )),
            })
        }
    }

    #[tokio::test]
    async fn test_pump_applies_completions() {
        let mut session = Session::new(100);
        session.start();
        let mut dispatcher = FetchDispatcher::new(Arc::new(EmptyBackend), 2);

        let mut applied = pump(&mut session, &mut dispatcher);
        for _ in 0..100 {
            if applied == 2 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
            applied += pump(&mut session, &mut dispatcher);
        }
        assert_eq!(applied, 2);
        assert!(session.applications().page().is_some());
        assert!(session.identity().loaded().is_some());
    }
}
