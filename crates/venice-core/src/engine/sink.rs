use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Producer side of the fragment channel handed to [`super::TextGeneration::generate`].
///
/// Used from the generation worker thread only; every call blocks until the
/// relay has room for the fragment.
#[derive(Debug)]
pub struct FragmentSink {
    tx: mpsc::Sender<String>,
    cancel: CancellationToken,
}

impl FragmentSink {
    pub fn new(tx: mpsc::Sender<String>, cancel: CancellationToken) -> Self {
        Self { tx, cancel }
    }

    /// Forward one fragment. Returns `false` when generation should stop:
    /// the turn was cancelled or the receiving side is gone.
    pub fn emit(&self, fragment: String) -> bool {
        if self.cancel.is_cancelled() {
            return false;
        }
        if fragment.is_empty() {
            return true;
        }
        match self.tx.blocking_send(fragment) {
            Ok(()) => true,
            Err(_) => {
                self.cancel.cancel();
                false
            }
        }
    }

    /// `true` once the turn has been cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled() || self.tx.is_closed()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn emit_stops_after_cancel() {
        let (tx, mut rx) = mpsc::channel(4);
        let cancel = CancellationToken::new();
        let sink = FragmentSink::new(tx, cancel.clone());

        assert!(sink.emit("a".into()));
        cancel.cancel();
        assert!(!sink.emit("b".into()));
        assert!(sink.is_cancelled());
        assert_eq!(rx.try_recv().ok().as_deref(), Some("a"));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn emit_cancels_when_receiver_dropped() {
        let (tx, rx) = mpsc::channel(4);
        let cancel = CancellationToken::new();
        let sink = FragmentSink::new(tx, cancel.clone());
        drop(rx);

        assert!(!sink.emit("lost".into()));
        assert!(cancel.is_cancelled());
    }

    #[test]
    fn empty_fragments_are_not_forwarded() {
        let (tx, mut rx) = mpsc::channel(4);
        let sink = FragmentSink::new(tx, CancellationToken::new());

        assert!(sink.emit(String::new()));
        assert!(rx.try_recv().is_err());
    }
}
