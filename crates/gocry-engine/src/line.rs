//! Line-directive encryption
//!
//! Encrypt: a line ending with the encrypt directive is sealed whole and
//! replaced by `<decrypt directive>: <base64 envelope>`.
//! Decrypt: a line starting with `<decrypt directive>: ` is replaced by the
//! plaintext recovered from the rest of the line.
//! Every other line is copied through unchanged.
//!
//! All lines are read before any work starts. Sealing and opening run on a
//! dedicated rayon pool; each task writes only its own result slot, and the
//! slots are written out in input order once the pool is done. On failure
//! the error of the lowest failing line is reported and nothing is written.

use rayon::prelude::*;
use std::borrow::Cow;
use std::io::{BufRead, BufReader, BufWriter, Read, Write};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tracing::debug;

use gocry_core::{CipherKind, Directives, GocryError, GocryResult, IoResultExt, Operation};
use gocry_crypto::{open_armored, seal_armored, SecretKey};

pub struct LineProcessor<'a> {
    key: &'a SecretKey,
    directives: &'a Directives,
    cipher: CipherKind,
    parallelism: usize,
    join_standalone: bool,
}

/// What to do with one output line (or joined pair of input lines)
enum Action<'a> {
    Keep(&'a [u8]),
    Seal(Cow<'a, [u8]>),
    Open(&'a [u8]),
}

struct Task<'a> {
    /// Zero-based index of the first input line this task covers
    line: usize,
    action: Action<'a>,
}

type Slot<'a> = Option<GocryResult<Cow<'a, [u8]>>>;

impl<'a> LineProcessor<'a> {
    pub fn new(key: &'a SecretKey, directives: &'a Directives, cipher: CipherKind) -> Self {
        Self {
            key,
            directives,
            cipher,
            parallelism: 1,
            join_standalone: false,
        }
    }

    pub fn parallelism(mut self, workers: usize) -> Self {
        self.parallelism = workers.max(1);
        self
    }

    pub fn join_standalone(mut self, join: bool) -> Self {
        self.join_standalone = join;
        self
    }

    /// Transform `reader` into `writer`; returns whether any directive matched.
    pub fn process<R: Read, W: Write>(
        &self,
        operation: Operation,
        reader: R,
        writer: W,
    ) -> GocryResult<bool> {
        let lines = read_lines(reader)?;
        let prefix = self.directives.decrypt_prefix();
        let tasks = self.plan(operation, &lines, prefix.as_bytes());
        let candidates = tasks
            .iter()
            .filter(|t| !matches!(t.action, Action::Keep(_)))
            .count();

        debug!(
            lines = lines.len(),
            candidates,
            workers = self.parallelism,
            "line pass"
        );

        if candidates == 0 {
            write_lines(writer, lines.iter().map(Vec::as_slice))?;
            return Ok(false);
        }

        let (slots, processed) = self.run_all(&tasks, prefix.as_bytes())?;

        // Empty slots only ever follow a failed one, and collection stops
        // at the first error in input order.
        let out = slots
            .into_iter()
            .zip(&tasks)
            .filter_map(|(slot, task)| slot.map(|r| r.map_err(|e| e.at_line(task.line + 1))))
            .collect::<GocryResult<Vec<_>>>()?;

        write_lines(writer, out.iter().map(|b| &b[..]))?;
        Ok(processed)
    }

    /// Classify every line once, in order.
    fn plan<'l>(&self, operation: Operation, lines: &'l [Vec<u8>], prefix: &[u8]) -> Vec<Task<'l>> {
        let encrypt = self.directives.encrypt.as_bytes();
        let mut tasks = Vec::with_capacity(lines.len());
        let mut idx = 0;

        while idx < lines.len() {
            let line = lines[idx].as_slice();
            let covered = match operation {
                Operation::Encrypt
                    if self.join_standalone
                        && line.trim_ascii() == encrypt
                        && idx + 1 < lines.len() =>
                {
                    let mut joined = Vec::with_capacity(line.len() + 1 + lines[idx + 1].len());
                    joined.extend_from_slice(line);
                    joined.push(b'\n');
                    joined.extend_from_slice(&lines[idx + 1]);
                    tasks.push(Task {
                        line: idx,
                        action: Action::Seal(Cow::Owned(joined)),
                    });
                    2
                }
                Operation::Encrypt if line.ends_with(encrypt) => {
                    tasks.push(Task {
                        line: idx,
                        action: Action::Seal(Cow::Borrowed(line)),
                    });
                    1
                }
                Operation::Decrypt if line.starts_with(prefix) => {
                    tasks.push(Task {
                        line: idx,
                        action: Action::Open(&line[prefix.len()..]),
                    });
                    1
                }
                _ => {
                    tasks.push(Task {
                        line: idx,
                        action: Action::Keep(line),
                    });
                    1
                }
            };
            idx += covered;
        }

        tasks
    }

    /// Run every task on a pool of `parallelism` threads, one slot per task.
    /// Also reports whether any directive line was transformed.
    fn run_all<'t>(
        &self,
        tasks: &'t [Task<'t>],
        prefix: &[u8],
    ) -> GocryResult<(Vec<Slot<'t>>, bool)> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.parallelism)
            .thread_name(|i| format!("gocry-line-{i}"))
            .build()
            .map_err(|e| GocryError::Config(format!("building worker pool: {e}")))?;

        let mut slots: Vec<Slot<'t>> = Vec::with_capacity(tasks.len());
        slots.resize_with(tasks.len(), || None);

        let lowest_failure = AtomicUsize::new(usize::MAX);
        let any_processed = AtomicBool::new(false);

        pool.install(|| {
            slots
                .par_iter_mut()
                .zip(tasks.par_iter())
                .enumerate()
                .for_each(|(idx, (slot, task))| {
                    if idx > lowest_failure.load(Ordering::Acquire) {
                        return;
                    }
                    let result = self.run(&task.action, prefix);
                    match &result {
                        Err(_) => {
                            lowest_failure.fetch_min(idx, Ordering::AcqRel);
                        }
                        Ok(_) if !matches!(task.action, Action::Keep(_)) => {
                            any_processed.store(true, Ordering::Relaxed);
                        }
                        Ok(_) => {}
                    }
                    *slot = Some(result);
                });
        });

        let processed = any_processed.load(Ordering::Relaxed);
        debug!(processed, "line pool finished");
        Ok((slots, processed))
    }

    fn run<'t>(&self, action: &'t Action<'t>, prefix: &[u8]) -> GocryResult<Cow<'t, [u8]>> {
        match action {
            Action::Keep(line) => Ok(Cow::Borrowed(*line)),
            Action::Seal(content) => {
                let armored = seal_armored(self.cipher, self.key, content)?;
                let mut out = Vec::with_capacity(prefix.len() + armored.len());
                out.extend_from_slice(prefix);
                out.extend_from_slice(armored.as_bytes());
                Ok(Cow::Owned(out))
            }
            Action::Open(armored) => open_armored(self.key, armored).map(Cow::Owned),
        }
    }
}

/// Split on `\n`, dropping one trailing `\r` per line. A final line without
/// a newline is still a line; an empty input has no lines.
fn read_lines<R: Read>(reader: R) -> GocryResult<Vec<Vec<u8>>> {
    BufReader::new(reader)
        .split(b'\n')
        .map(|line| {
            line.map(|mut l| {
                if l.last() == Some(&b'\r') {
                    l.pop();
                }
                l
            })
        })
        .collect::<std::io::Result<Vec<_>>>()
        .io_context("reading lines")
}

fn write_lines<'b, W: Write>(writer: W, lines: impl Iterator<Item = &'b [u8]>) -> GocryResult<()> {
    let mut writer = BufWriter::new(writer);
    for line in lines {
        writer.write_all(line).io_context("writing line")?;
        writer.write_all(b"\n").io_context("writing line")?;
    }
    writer.flush().io_context("flushing output")
}

#[cfg(test)]
mod tests {
    use super::*;
    use gocry_core::ErrorKind;

    fn key() -> SecretKey {
        SecretKey::new(vec![0x33u8; 32]).unwrap()
    }

    fn run(
        processor: &LineProcessor<'_>,
        operation: Operation,
        input: &str,
    ) -> GocryResult<(bool, String)> {
        let mut out = Vec::new();
        let processed = processor.process(operation, input.as_bytes(), &mut out)?;
        Ok((processed, String::from_utf8(out).unwrap()))
    }

    #[test]
    fn test_read_lines_handles_crlf_and_missing_newline() {
        let lines = read_lines(&b"a\r\nb\n\nc"[..]).unwrap();
        assert_eq!(lines, vec![b"a".to_vec(), b"b".to_vec(), b"".to_vec(), b"c".to_vec()]);
        assert!(read_lines(&b""[..]).unwrap().is_empty());
    }

    #[test]
    fn test_passthrough_without_directives() {
        let key = key();
        let directives = Directives::default();
        let processor = LineProcessor::new(&key, &directives, CipherKind::Randomized);

        let (processed, out) = run(&processor, Operation::Encrypt, "one\ntwo\r\nthree").unwrap();
        assert!(!processed);
        assert_eq!(out, "one\ntwo\nthree\n");
    }

    #[test]
    fn test_encrypt_rewrites_only_marked_lines() {
        let key = key();
        let directives = Directives::new("#enc", "#dec");
        let processor = LineProcessor::new(&key, &directives, CipherKind::Randomized);

        let (processed, out) = run(&processor, Operation::Encrypt, "a\nsecret #enc\nb\n").unwrap();
        assert!(processed);

        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "a");
        assert!(lines[1].starts_with("#dec: "));
        assert!(!lines[1].contains("secret"));
        assert_eq!(lines[2], "b");
    }

    #[test]
    fn test_decrypt_ignores_directive_without_separator() {
        let key = key();
        let directives = Directives::new("#enc", "#dec");
        let processor = LineProcessor::new(&key, &directives, CipherKind::Randomized);

        let (processed, out) = run(&processor, Operation::Decrypt, "#dec:nospace\n#dec\n").unwrap();
        assert!(!processed);
        assert_eq!(out, "#dec:nospace\n#dec\n");
    }

    #[test]
    fn test_standalone_directive_joins_next_line() {
        let key = key();
        let directives = Directives::new("#enc", "#dec");
        let joining =
            LineProcessor::new(&key, &directives, CipherKind::Randomized).join_standalone(true);

        let input = "head\n  #enc  \npassword = hunter2\ntail\n";
        let (_, sealed) = run(&joining, Operation::Encrypt, input).unwrap();
        let lines: Vec<&str> = sealed.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "head");
        assert!(lines[1].starts_with("#dec: "));
        assert_eq!(lines[2], "tail");

        let (_, opened) = run(&joining, Operation::Decrypt, &sealed).unwrap();
        assert_eq!(opened, input);
    }

    #[test]
    fn test_standalone_directive_on_last_line_seals_alone() {
        let key = key();
        let directives = Directives::new("#enc", "#dec");
        let joining =
            LineProcessor::new(&key, &directives, CipherKind::Randomized).join_standalone(true);

        let (_, sealed) = run(&joining, Operation::Encrypt, "x\n#enc\n").unwrap();
        let lines: Vec<&str> = sealed.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[1].starts_with("#dec: "));
    }

    #[test]
    fn test_lowest_failing_line_is_reported() {
        let key = key();
        let directives = Directives::new("#enc", "#dec");
        let processor =
            LineProcessor::new(&key, &directives, CipherKind::Randomized).parallelism(8);

        let mut input = String::new();
        for i in 0..64 {
            if i == 10 || i == 40 {
                input.push_str("#dec: !!!not-base64!!!\n");
            } else {
                input.push_str(&format!("plain {i}\n"));
            }
        }

        for _ in 0..10 {
            let mut out = Vec::new();
            let err = processor
                .process(Operation::Decrypt, input.as_bytes(), &mut out)
                .unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Format);
            assert!(matches!(err, GocryError::Line { line: 11, .. }), "got {err}");
            assert!(out.is_empty(), "nothing is written on failure");
        }
    }

    #[test]
    fn test_skipped_lines_never_mask_the_first_failure() {
        let key = key();
        let directives = Directives::new("#enc", "#dec");
        let processor =
            LineProcessor::new(&key, &directives, CipherKind::Randomized).parallelism(4);

        // Every line fails, so most jobs see an earlier failure and skip
        let input = "#dec: ***\n".repeat(500);
        for _ in 0..10 {
            let mut out = Vec::new();
            let err = processor
                .process(Operation::Decrypt, input.as_bytes(), &mut out)
                .unwrap_err();
            assert!(matches!(err, GocryError::Line { line: 1, .. }), "got {err}");
            assert_eq!(err.kind(), ErrorKind::Format);
            assert!(out.is_empty());
        }
    }

    #[test]
    fn test_wrong_key_fails_whole_run() {
        let directives = Directives::new("#enc", "#dec");
        let k1 = key();
        let (_, sealed) = run(
            &LineProcessor::new(&k1, &directives, CipherKind::Randomized),
            Operation::Encrypt,
            "keep\nvalue #enc\n",
        )
        .unwrap();

        let k2 = SecretKey::new(vec![0x34u8; 32]).unwrap();
        let err = run(
            &LineProcessor::new(&k2, &directives, CipherKind::Randomized),
            Operation::Decrypt,
            &sealed,
        )
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Authentication);
    }
}
