//! Controlled incremental reveal of a complete assistant answer.
//!
//! The engine owns no timer: the consumer calls [`Typewriter::tick`] at the
//! reveal cadence (see [`REVEAL_INTERVAL_MS`]), which keeps it runnable under
//! a virtual clock in tests and cancellable by simply not ticking anymore.

/// Default reveal cadence in milliseconds.
pub const REVEAL_INTERVAL_MS: u64 = 18;

/// Characters revealed per tick, at most. Chunking by a few characters reads
/// smoother than strict one-by-one while keeping update frequency low.
const MAX_CHUNK: usize = 12;

#[derive(Debug, Default)]
pub struct Typewriter {
    full: Vec<char>,
    revealed: usize,
    output: String,
    streaming: bool,
    finished: bool,
}

impl Typewriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Begin revealing `full_text`, cancelling any prior run. Operates on
    /// `char` boundaries so multi-byte text is never split.
    pub fn start(&mut self, full_text: &str) {
        self.full = full_text.chars().collect();
        self.revealed = 0;
        self.output.clear();
        self.finished = self.full.is_empty();
        self.streaming = !self.finished;
    }

    /// Halt the clock without losing progress. Idempotent.
    pub fn pause(&mut self) {
        self.streaming = false;
    }

    /// Continue from the last revealed offset if text remains.
    pub fn resume(&mut self) {
        if !self.finished && self.revealed < self.full.len() {
            self.streaming = true;
        }
    }

    /// Finish at the current offset. Does not force-complete the text; the
    /// caller decides whether to snap the visible text to the full string.
    pub fn stop(&mut self) {
        self.streaming = false;
        self.finished = true;
    }

    /// Advance one clock tick. Returns `true` when this tick finished the run.
    pub fn tick(&mut self) -> bool {
        if !self.streaming {
            return false;
        }

        let remaining = self.full.len() - self.revealed;
        let take = remaining.min(MAX_CHUNK);
        self.output
            .extend(&self.full[self.revealed..self.revealed + take]);
        self.revealed += take;

        if self.revealed == self.full.len() {
            self.streaming = false;
            self.finished = true;
            return true;
        }
        false
    }

    /// Whether the engine is actively revealing (not paused/stopped/finished).
    pub fn is_streaming(&self) -> bool {
        self.streaming
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Text revealed so far.
    pub fn output(&self) -> &str {
        &self.output
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run_to_completion(tw: &mut Typewriter) {
        for _ in 0..10_000 {
            if tw.tick() {
                return;
            }
        }
        panic!("typewriter did not finish");
    }

    #[test]
    fn reveals_full_text_exactly() {
        let text = "Điểm chuẩn ngành Quản trị Kinh doanh năm ngoái là 24,5 điểm.";
        let mut tw = Typewriter::new();
        tw.start(text);
        run_to_completion(&mut tw);
        assert_eq!(tw.output(), text);
        assert!(tw.is_finished());
        assert!(!tw.is_streaming());
    }

    #[test]
    fn pause_and_resume_lose_nothing() {
        let text = "abcdefghijklmnopqrstuvwxyz0123456789";
        let mut tw = Typewriter::new();
        tw.start(text);

        tw.tick();
        tw.pause();
        tw.pause(); // idempotent
        let frozen = tw.output().to_string();
        assert!(!tw.tick(), "paused engine must not advance");
        assert_eq!(tw.output(), frozen);

        tw.resume();
        run_to_completion(&mut tw);
        assert_eq!(tw.output(), text);
    }

    #[test]
    fn stop_keeps_partial_output() {
        let mut tw = Typewriter::new();
        tw.start("một hai ba bốn năm sáu bảy tám chín mười");
        tw.tick();
        let partial = tw.output().to_string();
        tw.stop();
        assert!(tw.is_finished());
        assert_eq!(tw.output(), partial);
        assert!(!tw.tick());
    }

    #[test]
    fn restart_resets_cleanly() {
        let mut tw = Typewriter::new();
        tw.start("first answer");
        tw.tick();
        tw.start("second");
        assert_eq!(tw.output(), "");
        run_to_completion(&mut tw);
        assert_eq!(tw.output(), "second");
    }

    #[test]
    fn resume_after_completion_is_a_no_op() {
        let mut tw = Typewriter::new();
        tw.start("xin chào");
        run_to_completion(&mut tw);
        tw.resume();
        assert!(!tw.is_streaming());
        assert!(!tw.tick());
    }

    #[test]
    fn empty_text_finishes_immediately() {
        let mut tw = Typewriter::new();
        tw.start("");
        assert!(tw.is_finished());
        assert!(!tw.is_streaming());
        assert_eq!(tw.output(), "");
    }

    #[test]
    fn multibyte_text_is_never_split() {
        let text = "tiếng Việt có dấu: ắằẳẵặấầẩẫậ";
        let mut tw = Typewriter::new();
        tw.start(text);
        loop {
            let done = tw.tick();
            // Every intermediate output must be a char-boundary prefix.
            assert!(text.starts_with(tw.output()));
            if done {
                break;
            }
        }
        assert_eq!(tw.output(), text);
    }
}
