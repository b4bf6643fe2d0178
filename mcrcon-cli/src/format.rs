//! Rendering of Minecraft `§` formatting codes in response bodies.

use std::io::{self, Write};

/// `§` in UTF-8.
const SECTION_SIGN: [u8; 2] = [0xc2, 0xa7];

const RESET: &[u8] = b"\x1b[0m";

/// How formatting codes in a response are handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorMode {
    /// Translate codes to ANSI escapes.
    Ansi,
    /// Remove codes.
    Strip,
    /// Print the body untouched.
    Raw,
}

fn ansi_escape(code: u8) -> Option<&'static [u8]> {
    let escape: &[u8] = match code {
        b'0' => b"\x1b[0;30m",   // black
        b'1' => b"\x1b[0;34m",   // dark blue
        b'2' => b"\x1b[0;32m",   // dark green
        b'3' => b"\x1b[0;36m",   // dark aqua
        b'4' => b"\x1b[0;31m",   // dark red
        b'5' => b"\x1b[0;35m",   // dark purple
        b'6' => b"\x1b[0;33m",   // gold
        b'7' => b"\x1b[0;37m",   // gray
        b'8' => b"\x1b[0;1;30m", // dark gray
        b'9' => b"\x1b[0;1;34m", // blue
        b'a' => b"\x1b[0;1;32m", // green
        b'b' => b"\x1b[0;1;36m", // aqua
        b'c' => b"\x1b[0;1;31m", // red
        b'd' => b"\x1b[0;1;35m", // light purple
        b'e' => b"\x1b[0;1;33m", // yellow
        b'f' => b"\x1b[0;1;37m", // white
        b'n' => b"\x1b[4m",      // underline
        b'r' => RESET,
        _ => return None,
    };
    Some(escape)
}

enum Token {
    Code(u8),
    Byte(u8),
}

/// Split text into `§x` codes and plain bytes. A sign only starts a code when a code byte follows.
fn tokens(text: &[u8]) -> impl Iterator<Item = Token> + '_ {
    let mut i = 0;
    std::iter::from_fn(move || {
        let byte = *text.get(i)?;
        if i + 2 < text.len() && text[i..i + 2] == SECTION_SIGN {
            i += 3;
            Some(Token::Code(text[i - 1]))
        } else {
            i += 1;
            Some(Token::Byte(byte))
        }
    })
}

pub fn strip_codes(text: &[u8]) -> Vec<u8> {
    tokens(text)
        .filter_map(|token| match token {
            Token::Byte(byte) => Some(byte),
            Token::Code(_) => None,
        })
        .collect()
}

/// Translate codes to ANSI escapes, resetting before every line break and at the end.
pub fn ansi_codes(text: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(text.len() + RESET.len());
    for token in tokens(text) {
        match token {
            Token::Code(code) => {
                if let Some(escape) = ansi_escape(code) {
                    out.extend_from_slice(escape);
                }
            }
            Token::Byte(b'\n') => {
                out.extend_from_slice(RESET);
                out.push(b'\n');
            }
            Token::Byte(byte) => out.push(byte),
        }
    }
    out.extend_from_slice(RESET);
    out
}

/// Write a response body to `out` in the given mode.
///
/// Raw bodies are written as-is. Otherwise a newline is added if the rendered text lacks one.
pub fn write_response(out: &mut dyn Write, body: &[u8], mode: ColorMode) -> io::Result<()> {
    let rendered = match mode {
        ColorMode::Raw => return out.write_all(body),
        ColorMode::Strip => strip_codes(body),
        ColorMode::Ansi => ansi_codes(body),
    };

    out.write_all(&rendered)?;
    if !rendered.ends_with(b"\n") {
        out.write_all(b"\n")?;
    }
    out.flush()
}
