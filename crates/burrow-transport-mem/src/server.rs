//! Listening server and its ordered event driver.

use std::net::SocketAddr;
use std::sync::Arc;

use burrow_core::{
    Channel, ChannelEvent, ChannelHandler, ChannelId, ChannelIds, PipelineError, TunnelConfig,
};
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::{MemChannel, TransportError};

/// An in-memory listening server.
///
/// Every lifecycle event on the listener is delivered to the handler in
/// order, one at a time, by a dedicated driver task. `Opened` is the
/// exception: it is delivered synchronously from [`bind`](Self::bind) so a
/// pipeline failure reaches the caller.
///
/// Closing the listener, by [`close`](Self::close), through the
/// [`Channel`] handle, or by dropping the server, makes the driver deliver
/// whatever is still queued, then `Unbound` if still bound, then `Closed`.
/// Accepted children are left open.
pub struct MemServer {
    listener: Arc<MemChannel>,
    ids: Arc<ChannelIds>,
    config: TunnelConfig,
    events: mpsc::UnboundedSender<ChannelEvent>,
    driver: Mutex<Option<JoinHandle<()>>>,
}

impl MemServer {
    /// Open a listener, configure it through `handler`, and bind it to `addr`.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn bind(
        addr: SocketAddr,
        handler: Arc<dyn ChannelHandler>,
        ids: Arc<ChannelIds>,
        config: TunnelConfig,
    ) -> Result<Self, TransportError> {
        let listener = Arc::new(MemChannel::listener(ids.next_id(), config.watermarks));

        if let Err(error) = handler.handle_event(listener.as_ref(), ChannelEvent::Opened) {
            listener.close();
            return Err(error.into());
        }

        listener.set_local_addr(Some(addr));
        let (events, rx) = mpsc::unbounded_channel();
        // The receiver is alive until the driver exits.
        let _ = events.send(ChannelEvent::Bound(addr));

        let driver = tokio::spawn(drive(Arc::clone(&listener), handler, rx));
        tracing::debug!(listener = %listener.id(), %addr, "server bound");

        Ok(Self {
            listener,
            ids,
            config,
            events,
            driver: Mutex::new(Some(driver)),
        })
    }

    pub fn id(&self) -> ChannelId {
        self.listener.id()
    }

    pub fn listener(&self) -> &Arc<MemChannel> {
        &self.listener
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn is_open(&self) -> bool {
        self.listener.is_open()
    }

    /// Accept a new child connection.
    ///
    /// The child is configured with the listener's pipeline factory before
    /// `ChildAccepted` is queued. If configuration fails the child is closed
    /// and never announced.
    pub fn accept(&self) -> Result<Arc<MemChannel>, TransportError> {
        if !self.listener.is_open() {
            return Err(TransportError::Closed);
        }
        let addr = self.listener.local_addr().ok_or(TransportError::NotBound)?;

        let child = Arc::new(MemChannel::child(
            self.ids.next_id(),
            self.listener.id(),
            addr,
            self.config.watermarks,
        ));

        if let Some(factory) = self.listener.pipeline() {
            if let Err(error) = child.install_pipeline(factory) {
                tracing::warn!(
                    listener = %self.listener.id(),
                    child = %child.id(),
                    %error,
                    "child rejected"
                );
                child.close();
                return Err(error.into());
            }
        }

        if self
            .events
            .send(ChannelEvent::ChildAccepted(child.clone()))
            .is_err()
        {
            child.close();
            return Err(TransportError::Closed);
        }
        Ok(child)
    }

    /// Release the bound address. The listener stays open.
    pub fn unbind(&self) -> Result<(), TransportError> {
        if !self.listener.is_open() {
            return Err(TransportError::Closed);
        }
        self.listener
            .set_local_addr(None)
            .ok_or(TransportError::NotBound)?;
        self.events
            .send(ChannelEvent::Unbound)
            .map_err(|_| TransportError::Closed)
    }

    /// Close the listener. Idempotent.
    pub fn close(&self) {
        self.listener.close();
    }

    /// Wait until the driver has delivered its last event.
    pub async fn join(&self) {
        let driver = self.driver.lock().take();
        if let Some(driver) = driver {
            if let Err(error) = driver.await {
                tracing::error!(listener = %self.listener.id(), %error, "listener driver failed");
            }
        }
    }
}

impl std::fmt::Debug for MemServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemServer")
            .field("listener", &self.listener)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

async fn drive(
    listener: Arc<MemChannel>,
    handler: Arc<dyn ChannelHandler>,
    mut rx: mpsc::UnboundedReceiver<ChannelEvent>,
) {
    let id = listener.id();
    let mut bound = false;
    tracing::debug!(listener = %id, "listener driver started");

    loop {
        tokio::select! {
            biased;

            event = rx.recv() => match event {
                Some(event) => {
                    if deliver(&listener, handler.as_ref(), &mut bound, event).is_err() {
                        return;
                    }
                }
                None => {
                    // Server dropped without closing.
                    listener.close();
                    break;
                }
            },

            () = listener.closed() => break,
        }
    }

    // No more events can be queued; flush what made it in before the close.
    rx.close();
    while let Some(event) = rx.recv().await {
        if deliver(&listener, handler.as_ref(), &mut bound, event).is_err() {
            return;
        }
    }

    listener.set_local_addr(None);
    if bound && deliver(&listener, handler.as_ref(), &mut bound, ChannelEvent::Unbound).is_err() {
        return;
    }
    let _ = deliver(&listener, handler.as_ref(), &mut bound, ChannelEvent::Closed);
    tracing::debug!(listener = %id, "listener driver stopped");
}

fn deliver(
    listener: &MemChannel,
    handler: &dyn ChannelHandler,
    bound: &mut bool,
    event: ChannelEvent,
) -> Result<(), PipelineError> {
    let binding = match &event {
        ChannelEvent::Bound(_) => Some(true),
        ChannelEvent::Unbound => Some(false),
        _ => None,
    };
    tracing::trace!(listener = %listener.id(), event = event.kind(), "delivering");

    if let Err(error) = handler.handle_event(listener, event) {
        tracing::error!(listener = %listener.id(), %error, "handler failed; stopping delivery");
        listener.close();
        return Err(error);
    }
    if let Some(binding) = binding {
        *bound = binding;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use burrow_core::PipelineFactory;

    use super::*;

    /// Handler that records event kinds, optionally failing on one.
    #[derive(Default)]
    struct Recorder {
        seen: Mutex<Vec<&'static str>>,
        fail_on: Option<&'static str>,
    }

    impl ChannelHandler for Recorder {
        fn handle_event(
            &self,
            channel: &dyn Channel,
            event: ChannelEvent,
        ) -> Result<(), PipelineError> {
            let kind = event.kind();
            self.seen.lock().push(kind);
            if self.fail_on == Some(kind) {
                return Err(PipelineError::rejected(channel.id(), "refused"));
            }
            Ok(())
        }
    }

    fn addr() -> SocketAddr {
        "127.0.0.1:7070".parse().unwrap()
    }

    fn bind(recorder: Arc<Recorder>) -> Result<MemServer, TransportError> {
        MemServer::bind(
            addr(),
            recorder,
            Arc::new(ChannelIds::new()),
            TunnelConfig::default(),
        )
    }

    async fn join(server: &MemServer) {
        tokio::time::timeout(Duration::from_secs(1), server.join())
            .await
            .expect("driver did not stop");
    }

    #[tokio::test]
    async fn full_lifecycle_is_delivered_in_order() {
        let recorder = Arc::new(Recorder::default());
        let server = bind(recorder.clone()).unwrap();
        server.accept().unwrap();
        server.unbind().unwrap();
        server.close();
        join(&server).await;

        assert_eq!(
            *recorder.seen.lock(),
            vec!["opened", "bound", "child-accepted", "unbound", "closed"]
        );
    }

    #[tokio::test]
    async fn close_while_bound_unbinds_first() {
        let recorder = Arc::new(Recorder::default());
        let server = bind(recorder.clone()).unwrap();
        server.close();
        join(&server).await;

        assert_eq!(*recorder.seen.lock(), vec!["opened", "bound", "unbound", "closed"]);
        assert_eq!(server.local_addr(), None);
    }

    #[tokio::test]
    async fn closing_the_listener_handle_stops_the_server() {
        let recorder = Arc::new(Recorder::default());
        let server = bind(recorder.clone()).unwrap();
        server.listener().close();
        join(&server).await;

        assert_eq!(recorder.seen.lock().last(), Some(&"closed"));
        assert_eq!(server.accept().unwrap_err(), TransportError::Closed);
    }

    #[tokio::test]
    async fn dropping_the_server_closes_the_listener() {
        let recorder = Arc::new(Recorder::default());
        let server = bind(recorder.clone()).unwrap();
        let listener = server.listener().clone();
        drop(server);

        tokio::time::timeout(Duration::from_secs(1), listener.closed())
            .await
            .expect("listener did not close");
        // Give the driver a moment to finish delivering.
        for _ in 0..100 {
            if recorder.seen.lock().last() == Some(&"closed") {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert_eq!(recorder.seen.lock().last(), Some(&"closed"));
    }

    #[tokio::test]
    async fn failed_open_is_returned_and_nothing_follows() {
        let recorder = Arc::new(Recorder {
            fail_on: Some("opened"),
            ..Default::default()
        });
        let err = bind(recorder.clone()).unwrap_err();

        assert!(matches!(err, TransportError::Pipeline(_)));
        tokio::task::yield_now().await;
        assert_eq!(*recorder.seen.lock(), vec!["opened"]);
    }

    #[tokio::test]
    async fn handler_error_stops_delivery() {
        let recorder = Arc::new(Recorder {
            fail_on: Some("bound"),
            ..Default::default()
        });
        let server = bind(recorder.clone()).unwrap();
        join(&server).await;

        assert!(!server.is_open());
        assert_eq!(*recorder.seen.lock(), vec!["opened", "bound"]);
    }

    #[tokio::test]
    async fn accept_requires_a_bound_listener() {
        let recorder = Arc::new(Recorder::default());
        let server = bind(recorder).unwrap();
        server.unbind().unwrap();

        assert_eq!(server.accept().unwrap_err(), TransportError::NotBound);
        assert_eq!(server.unbind().unwrap_err(), TransportError::NotBound);
    }

    #[tokio::test]
    async fn children_inherit_the_listener_pipeline() {
        struct Installing(Arc<dyn PipelineFactory>);

        impl ChannelHandler for Installing {
            fn handle_event(
                &self,
                channel: &dyn Channel,
                event: ChannelEvent,
            ) -> Result<(), PipelineError> {
                if let ChannelEvent::Opened = event {
                    channel.install_pipeline(self.0.clone())?;
                }
                Ok(())
            }
        }

        let configured = Arc::new(Mutex::new(Vec::new()));
        let factory: Arc<dyn PipelineFactory> = {
            let configured = configured.clone();
            Arc::new(move |ch: &dyn Channel| -> Result<(), PipelineError> {
                configured.lock().push(ch.id());
                Ok(())
            })
        };

        let server = MemServer::bind(
            addr(),
            Arc::new(Installing(factory)),
            Arc::new(ChannelIds::new()),
            TunnelConfig::default(),
        )
        .unwrap();
        let child = server.accept().unwrap();

        assert!(child.is_configured());
        assert_eq!(*configured.lock(), vec![server.id(), child.id()]);
    }
}
