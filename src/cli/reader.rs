//! cli::reader
//!
//! Feeds standard input into the line buffer.
//!
//! Reading runs on a dedicated OS thread because reads from stdin block and
//! cannot be cancelled; the thread ends with the process. Bytes are decoded
//! as UTF-8 across read boundaries; invalid sequences become U+FFFD. At end
//! of input a missing final newline is supplied and the buffer is closed.

use std::io::{self, Read};
use std::thread::JoinHandle;

use tracing::{debug, warn};

use crate::queue::line_buffer::NEWLINE;
use crate::queue::LineBuffer;

const READ_CHUNK: usize = 1024;

/// Start the keystroke reader on standard input.
///
/// # Errors
///
/// Returns an error if the thread cannot be spawned.
pub fn spawn_keystroke_reader(input: LineBuffer) -> io::Result<JoinHandle<()>> {
    std::thread::Builder::new()
        .name("trellis-keystrokes".into())
        .spawn(move || {
            if let Err(e) = read_keystrokes(io::stdin().lock(), &input) {
                warn!(error = %e, "reading standard input failed");
            }
            input.close();
            debug!("keystroke reader finished");
        })
}

/// Copy `reader` into `input` until end of input.
///
/// Does not close `input`.
///
/// # Errors
///
/// Returns the first read error other than an interruption.
pub fn read_keystrokes<R: Read>(mut reader: R, input: &LineBuffer) -> io::Result<()> {
    let mut buf = [0u8; READ_CHUNK];
    let mut pending: Vec<u8> = Vec::new();
    let mut last = None;

    loop {
        let n = match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        pending.extend_from_slice(&buf[..n]);
        let text = decode_prefix(&mut pending);
        if let Some(c) = text.chars().last() {
            last = Some(c);
        }
        input.feed(&text);
    }

    if !pending.is_empty() {
        let text = String::from_utf8_lossy(&pending).into_owned();
        last = text.chars().last().or(last);
        input.feed(&text);
    }
    if last.is_some_and(|c| c != NEWLINE) {
        input.feed("\n");
    }
    Ok(())
}

/// Decode as much of `bytes` as possible, leaving an incomplete trailing
/// sequence in place.
fn decode_prefix(bytes: &mut Vec<u8>) -> String {
    let mut text = String::new();
    loop {
        match std::str::from_utf8(bytes) {
            Ok(valid) => {
                text.push_str(valid);
                bytes.clear();
                return text;
            }
            Err(e) => {
                let valid = e.valid_up_to();
                text.push_str(&String::from_utf8_lossy(&bytes[..valid]));
                match e.error_len() {
                    Some(bad) => {
                        text.push(char::REPLACEMENT_CHARACTER);
                        bytes.drain(..valid + bad);
                    }
                    None => {
                        bytes.drain(..valid);
                        return text;
                    }
                }
            }
        }
    }
}
