//! The chunk-boundary-safe streaming redactor.

use crate::fingerprint::RunKey;
use crate::variants;
use opal_core::error::ScrubError;
use opal_core::pattern::{ScrubPattern, SecretProvider};
use std::io::{self, ErrorKind, Write};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio_util::sync::CancellationToken;

/// A redacting writer.
///
/// Every byte written flows through the current pattern table before it
/// reaches the underlying writer; known secrets (and their encoded
/// variants) are replaced by their display placeholders. Writes are
/// serialized by an internal mutex, so concurrent writers interleave
/// atomically at write boundaries.
///
/// ## Carry discipline
///
/// A secret split across write calls must still be redacted, so the
/// scrubber withholds any tail of the output that is a proper prefix of
/// a registered secret — at most `max_secret_len − 1` bytes. The carry
/// is re-examined with each subsequent chunk and redacted one final
/// time by [`close`](Scrubber::close).
///
/// Longest-first: when a shorter secret matches completely but a longer
/// registered secret could still complete across the chunk boundary,
/// the decision is deferred to the next chunk. `"SECRET"` is never
/// leaked as a partial replacement of `"SECRET_EXTENDED"`.
///
/// ## Close is mandatory
///
/// [`close`](Scrubber::close) redacts and flushes the carry. Dropping
/// an unclosed scrubber runs a best-effort close, but errors are lost
/// that way — call `close` on every exit path. Each `write` reports the
/// full input length; callers never observe internal buffering.
pub struct Scrubber<W: Write> {
    inner: Mutex<ScrubState<W>>,
    run_key: RunKey,
}

struct ScrubState<W: Write> {
    writer: W,
    provider: Arc<dyn SecretProvider>,
    patterns: Vec<ScrubPattern>,
    /// Longest registered pattern ever seen. Monotonic: the carry bound
    /// never shrinks mid-stream.
    max_len: usize,
    /// Count of source patterns at the last refresh.
    source_count: usize,
    carry: Vec<u8>,
    closed: bool,
    cancel: CancellationToken,
}

impl<W: Write> Scrubber<W> {
    /// Wrap `writer`, redacting with the patterns served by `provider`.
    ///
    /// The provider is consulted on every chunk, so secrets registered
    /// after construction are redacted from the next write onward.
    pub fn new(writer: W, provider: Arc<dyn SecretProvider>) -> Self {
        Self {
            inner: Mutex::new(ScrubState {
                writer,
                provider,
                patterns: Vec::new(),
                max_len: 0,
                source_count: 0,
                carry: Vec::new(),
                closed: false,
                cancel: CancellationToken::new(),
            }),
            run_key: RunKey::generate(),
        }
    }

    /// Attach an ambient cancellation token. A fired token fails
    /// subsequent writes with [`ScrubError::Cancelled`]; `close` still
    /// redacts and flushes the carry.
    pub fn with_cancellation(self, cancel: CancellationToken) -> Self {
        self.lock().cancel = cancel;
        self
    }

    fn lock(&self) -> MutexGuard<'_, ScrubState<W>> {
        self.inner.lock().expect("scrubber lock poisoned")
    }

    /// Write a chunk through the redactor. Returns `buf.len()` on
    /// success regardless of how many bytes were withheld as carry.
    pub fn write(&self, buf: &[u8]) -> Result<usize, ScrubError> {
        let mut state = self.lock();
        if state.closed {
            return Err(ScrubError::Closed);
        }
        if state.cancel.is_cancelled() {
            return Err(ScrubError::Cancelled);
        }
        state.refresh(&self.run_key);

        let mut data = std::mem::take(&mut state.carry);
        data.extend_from_slice(buf);
        let (emit, carry) = redact(&data, &state.patterns, true);
        state.carry = carry;
        state.write_all(&emit)?;
        Ok(buf.len())
    }

    /// Redact and flush the carry, then flush the underlying writer.
    /// Idempotent; a second call is a no-op.
    pub fn close(&self) -> Result<(), ScrubError> {
        let mut state = self.lock();
        state.close()
    }

    /// Keyed BLAKE2b-256 over arbitrary data under this run's key.
    /// Used for telemetry-safe identification of secret material; the
    /// digest is unlinkable across runs.
    pub(crate) fn fingerprint(&self, data: &[u8]) -> [u8; 32] {
        self.run_key.fingerprint(data)
    }
}

impl<W: Write> ScrubState<W> {
    fn refresh(&mut self, run_key: &RunKey) {
        let source = self.provider.patterns();
        if source.len() != self.source_count {
            for pattern in &source {
                tracing::trace!(
                    fingerprint = %hex::encode(run_key.fingerprint(&pattern.value)),
                    "scrub.pattern"
                );
            }
            tracing::debug!(count = source.len(), "scrub.patterns.refreshed");
        }
        self.source_count = source.len();

        let mut expanded: Vec<ScrubPattern> = Vec::new();
        for pattern in &source {
            expanded.extend(variants::expand(pattern));
        }
        expanded.sort_by(|a, b| b.value.len().cmp(&a.value.len()));
        let longest = expanded.first().map_or(0, |p| p.value.len());
        self.max_len = self.max_len.max(longest);
        self.patterns = expanded;
    }

    fn write_all(&mut self, mut buf: &[u8]) -> Result<(), ScrubError> {
        while !buf.is_empty() {
            match self.writer.write(buf) {
                Ok(0) => return Err(ScrubError::ShortWrite),
                Ok(n) => buf = &buf[n..],
                Err(e) if e.kind() == ErrorKind::Interrupted => {}
                Err(e) => return Err(ScrubError::Writer(e)),
            }
        }
        Ok(())
    }

    fn close(&mut self) -> Result<(), ScrubError> {
        if self.closed {
            return Ok(());
        }
        let data = std::mem::take(&mut self.carry);
        let (emit, rest) = redact(&data, &self.patterns, false);
        debug_assert!(rest.is_empty());
        self.write_all(&emit)?;
        self.writer.flush()?;
        self.closed = true;
        tracing::debug!("scrub.closed");
        Ok(())
    }
}

impl<W: Write> Drop for Scrubber<W> {
    fn drop(&mut self) {
        let mut state = self.lock();
        if !state.closed {
            let _ = state.close();
        }
    }
}

/// `std::io::Write` adapter for callers that take a generic writer.
/// Scrub errors surface as `io::Error` (`Other`).
impl<W: Write> Write for &Scrubber<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        Scrubber::write(*self, buf).map_err(io::Error::other)
    }

    fn flush(&mut self) -> io::Result<()> {
        // The carry cannot be flushed mid-stream without risking a
        // split secret; only the underlying writer is flushed here.
        self.lock().writer.flush()
    }
}

/// Scan `data`, replacing complete matches longest-first. With
/// `defer_partials`, scanning stops at the first position where a
/// longer registered secret could still complete beyond the end of
/// `data`; those bytes are returned as the new carry.
fn redact(data: &[u8], patterns: &[ScrubPattern], defer_partials: bool) -> (Vec<u8>, Vec<u8>) {
    let mut out = Vec::with_capacity(data.len());
    let mut i = 0;
    while i < data.len() {
        let rest = &data[i..];
        // Patterns are sorted by descending length; first hit is longest.
        let complete = patterns
            .iter()
            .find(|p| rest.len() >= p.value.len() && rest.starts_with(&p.value));
        if defer_partials {
            let complete_len = complete.map_or(0, |p| p.value.len());
            let pending = patterns.iter().any(|p| {
                p.value.len() > complete_len
                    && p.value.len() > rest.len()
                    && p.value.starts_with(rest)
            });
            if pending {
                return (out, rest.to_vec());
            }
        }
        match complete {
            Some(p) => {
                out.extend_from_slice(&p.placeholder);
                i += p.value.len();
            }
            None => {
                out.push(data[i]);
                i += 1;
            }
        }
    }
    (out, Vec::new())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    const PLACEHOLDER: &[u8] = b"opal:ABCDEFGHIJKLMNOPQRSTUV";

    fn fixed(patterns: Vec<(&[u8], &[u8])>) -> Arc<dyn SecretProvider> {
        Arc::new(opal_core::pattern::StaticPatterns(
            patterns
                .into_iter()
                .map(|(v, p)| ScrubPattern::new(v.to_vec(), p.to_vec()))
                .collect(),
        ))
    }

    fn collect<F>(provider: Arc<dyn SecretProvider>, feed: F) -> Vec<u8>
    where
        F: FnOnce(&Scrubber<&mut Vec<u8>>),
    {
        let mut sink = Vec::new();
        let scrubber = Scrubber::new(&mut sink, provider);
        feed(&scrubber);
        scrubber.close().unwrap();
        drop(scrubber);
        sink
    }

    #[test]
    fn single_chunk_redaction() {
        let out = collect(fixed(vec![(b"password123", PLACEHOLDER)]), |s| {
            s.write(b"user=admin pass=password123 end").unwrap();
        });
        assert_eq!(
            out,
            b"user=admin pass=opal:ABCDEFGHIJKLMNOPQRSTUV end".to_vec()
        );
    }

    #[test]
    fn secret_split_across_three_writes() {
        let out = collect(fixed(vec![(b"password123", PLACEHOLDER)]), |s| {
            s.write(b"user=admin pass=passw").unwrap();
            s.write(b"ord1").unwrap();
            s.write(b"23 end").unwrap();
        });
        assert_eq!(
            out,
            b"user=admin pass=opal:ABCDEFGHIJKLMNOPQRSTUV end".to_vec()
        );
    }

    #[test]
    fn intermediate_state_never_contains_cleartext() {
        let mut sink = Vec::new();
        let scrubber = Scrubber::new(&mut sink, fixed(vec![(b"password123", PLACEHOLDER)]));
        scrubber.write(b"pass=passwor").unwrap();
        scrubber.write(b"d123 end").unwrap();
        scrubber.close().unwrap();
        drop(scrubber);
        let text = String::from_utf8(sink).unwrap();
        assert!(!text.contains("password123"));
        assert_eq!(text.matches("opal:").count(), 1);
    }

    #[test]
    fn write_reports_full_input_length() {
        let mut sink = Vec::new();
        let scrubber = Scrubber::new(&mut sink, fixed(vec![(b"secret", PLACEHOLDER)]));
        // Ends in a partial match; bytes are withheld but the caller
        // still sees the full count.
        assert_eq!(scrubber.write(b"xxsec").unwrap(), 5);
        scrubber.close().unwrap();
    }

    #[test]
    fn longest_registered_value_wins() {
        let provider = fixed(vec![(b"SECRET", b"P1"), (b"SECRET_EXTENDED", b"P2")]);
        let out = collect(provider, |s| {
            s.write(b"x SECRET_EXTENDED y").unwrap();
        });
        assert_eq!(out, b"x P2 y".to_vec());
    }

    #[test]
    fn longest_wins_across_chunk_boundary() {
        let provider = fixed(vec![(b"SECRET", b"P1"), (b"SECRET_EXTENDED", b"P2")]);
        let out = collect(provider, |s| {
            s.write(b"x SECRET").unwrap();
            s.write(b"_EXTENDED y").unwrap();
        });
        assert_eq!(out, b"x P2 y".to_vec());
    }

    #[test]
    fn shorter_match_emitted_when_longer_never_completes() {
        let provider = fixed(vec![(b"SECRET", b"P1"), (b"SECRET_EXTENDED", b"P2")]);
        let out = collect(provider, |s| {
            s.write(b"x SECRET").unwrap();
            s.write(b"_PLAIN y").unwrap();
        });
        assert_eq!(out, b"x P1_PLAIN y".to_vec());
    }

    #[test]
    fn close_redacts_trailing_secret() {
        let out = collect(fixed(vec![(b"SECRET", b"P1"), (b"SECRETX", b"P2")]), |s| {
            // "SECRET" is complete but "SECRETX" could still follow, so
            // everything is carried; close must settle for "SECRET".
            s.write(b"tail SECRET").unwrap();
        });
        assert_eq!(out, b"tail P1".to_vec());
    }

    #[test]
    fn close_is_idempotent_and_write_after_close_errors() {
        let mut sink = Vec::new();
        let scrubber = Scrubber::new(&mut sink, fixed(vec![(b"s3cr3t", PLACEHOLDER)]));
        scrubber.write(b"a").unwrap();
        scrubber.close().unwrap();
        scrubber.close().unwrap();
        assert!(matches!(
            scrubber.write(b"b").unwrap_err(),
            ScrubError::Closed
        ));
    }

    #[test]
    fn variants_are_redacted() {
        let out = collect(fixed(vec![(b"password123", PLACEHOLDER)]), |s| {
            // standard base64 of "password123"
            s.write(b"b64=cGFzc3dvcmQxMjM= hex=70617373776f7264313233").unwrap();
        });
        let text = String::from_utf8(out).unwrap();
        assert!(!text.contains("cGFzc3dvcmQxMjM"));
        assert!(!text.contains("70617373776f7264313233"));
        assert_eq!(text.matches("opal:").count(), 2);
    }

    #[test]
    fn empty_secrets_are_ignored() {
        let out = collect(fixed(vec![(b"", PLACEHOLDER)]), |s| {
            s.write(b"nothing to hide").unwrap();
        });
        assert_eq!(out, b"nothing to hide".to_vec());
    }

    struct SharedPatterns(Arc<Mutex<Vec<ScrubPattern>>>);

    impl SecretProvider for SharedPatterns {
        fn patterns(&self) -> Vec<ScrubPattern> {
            self.0.lock().unwrap().clone()
        }
    }

    #[test]
    fn dynamic_patterns_apply_to_next_chunk() {
        let patterns: Arc<Mutex<Vec<ScrubPattern>>> = Arc::new(Mutex::new(Vec::new()));
        let provider: Arc<dyn SecretProvider> = Arc::new(SharedPatterns(Arc::clone(&patterns)));

        let mut sink = Vec::new();
        let scrubber = Scrubber::new(&mut sink, provider);
        scrubber.write(b"before-token ").unwrap();
        patterns
            .lock()
            .unwrap()
            .push(ScrubPattern::new(b"token".to_vec(), b"opal:T".to_vec()));
        scrubber.write(b"after-token").unwrap();
        scrubber.close().unwrap();
        drop(scrubber);
        assert_eq!(sink, b"before-token after-opal:T".to_vec());
    }

    #[test]
    fn cancellation_fails_writes_but_close_flushes() {
        let cancel = CancellationToken::new();
        let mut sink = Vec::new();
        let scrubber = Scrubber::new(&mut sink, fixed(vec![(b"SECRET", b"P1"), (b"SECRETX", b"P2")]))
            .with_cancellation(cancel.clone());
        scrubber.write(b"carry SECRET").unwrap();
        cancel.cancel();
        assert!(matches!(
            scrubber.write(b"more").unwrap_err(),
            ScrubError::Cancelled
        ));
        scrubber.close().unwrap();
        drop(scrubber);
        assert_eq!(sink, b"carry P1".to_vec());
    }

    struct ZeroWriter;
    impl Write for ZeroWriter {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Ok(0)
        }
        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn zero_length_underlying_write_is_short_write() {
        let scrubber = Scrubber::new(ZeroWriter, fixed(vec![(b"s3cr3t", PLACEHOLDER)]));
        assert!(matches!(
            scrubber.write(b"payload").unwrap_err(),
            ScrubError::ShortWrite
        ));
    }

    struct FailingWriter;
    impl Write for FailingWriter {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(ErrorKind::BrokenPipe, "pipe closed"))
        }
        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn underlying_writer_errors_propagate() {
        let scrubber = Scrubber::new(FailingWriter, fixed(vec![(b"s3cr3t", PLACEHOLDER)]));
        assert!(matches!(
            scrubber.write(b"payload").unwrap_err(),
            ScrubError::Writer(_)
        ));
    }

    #[test]
    fn drop_backstop_flushes_carry() {
        let sink: Arc<Mutex<Vec<u8>>> = Arc::new(Mutex::new(Vec::new()));

        struct SharedSink(Arc<Mutex<Vec<u8>>>);
        impl Write for SharedSink {
            fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
                self.0.lock().unwrap().extend_from_slice(buf);
                Ok(buf.len())
            }
            fn flush(&mut self) -> io::Result<()> {
                Ok(())
            }
        }

        let scrubber = Scrubber::new(
            SharedSink(Arc::clone(&sink)),
            fixed(vec![(b"SECRET", b"P1"), (b"SECRETX", b"P2")]),
        );
        scrubber.write(b"end SECRET").unwrap();
        drop(scrubber);
        assert_eq!(*sink.lock().unwrap(), b"end P1".to_vec());
    }

    #[test]
    fn fingerprint_is_stable_within_a_run() {
        let scrubber = Scrubber::new(Vec::new(), fixed(vec![]));
        assert_eq!(scrubber.fingerprint(b"data"), scrubber.fingerprint(b"data"));
        assert_ne!(scrubber.fingerprint(b"data"), scrubber.fingerprint(b"other"));
    }

    #[test]
    fn io_write_adapter_redacts() {
        let mut sink = Vec::new();
        let scrubber = Scrubber::new(&mut sink, fixed(vec![(b"password123", PLACEHOLDER)]));
        let mut handle = &scrubber;
        handle.write_all(b"pass=password123").unwrap();
        handle.flush().unwrap();
        scrubber.close().unwrap();
        drop(scrubber);
        assert_eq!(sink, b"pass=opal:ABCDEFGHIJKLMNOPQRSTUV".to_vec());
    }
}
