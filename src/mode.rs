//! Permission mode interpretation.
//!
//! Modes arrive in three shapes:
//!
//! | Shape | Example | Meaning |
//! |-------|---------|---------|
//! | symbolic string | `"rwsr-x--T"`, `"drwxr-xr-x"` | `ls -l` style, special bits included |
//! | three-char string | `"755"` | octal literal, at most `777` |
//! | integer | `493` | already packed, at most `511` |
//!
//! A missing mode falls back to the default for the entry type with the
//! umask removed. Symlinks are never masked.

use serde_json::Value;

use crate::{FileType, Permissions};

const DEFAULT_FILE_MODE: u32 = 0o666;
const DEFAULT_DIR_MODE: u32 = 0o777;
const SYMLINK_MODE: u32 = 0o777;
const MAX_PLAIN_MODE: u32 = 0o777;

/// Umask used when neither the options nor the node supply one.
pub const DEFAULT_UMASK: u32 = 0o022;

/// Interpret a mode value, returning `None` when it is not a valid mode.
///
/// # Example
///
/// ```rust
/// use jsondir::{interpret_mode, FileType};
/// use serde_json::json;
///
/// let mode = interpret_mode(Some(&json!("rwxr-xr-x")), None, 0).unwrap();
/// assert_eq!(mode.mode(), 0o755);
///
/// let mode = interpret_mode(None, Some(FileType::File), 0o022).unwrap();
/// assert_eq!(mode.mode(), 0o644);
///
/// assert!(interpret_mode(Some(&json!(512)), None, 0).is_none());
/// ```
pub fn interpret_mode(
    mode: Option<&Value>,
    file_type: Option<FileType>,
    umask: u32,
) -> Option<Permissions> {
    match mode {
        None => file_type.map(|ty| default_mode(ty, umask)),
        Some(Value::String(text)) => parse_text(text),
        Some(Value::Number(number)) => number
            .as_u64()
            .filter(|n| *n <= u64::from(MAX_PLAIN_MODE))
            .map(|n| Permissions::from_mode(n as u32)),
        Some(_) => None,
    }
}

/// Interpret a umask value: an integer or a three-digit octal string, at
/// most `0o777`.
pub fn interpret_umask(umask: &Value) -> Option<u32> {
    match umask {
        Value::String(text) if text.chars().count() == 3 => parse_octal(text),
        Value::Number(number) => number
            .as_u64()
            .filter(|n| *n <= u64::from(MAX_PLAIN_MODE))
            .map(|n| n as u32),
        _ => None,
    }
}

/// Render permissions in the nine-character symbolic form.
///
/// ```rust
/// use jsondir::{format_mode, Permissions};
///
/// assert_eq!(format_mode(Permissions::from_mode(0o4755)), "rwsr-xr-x");
/// assert_eq!(format_mode(Permissions::from_mode(0o1776)), "rwxrwxrwT");
/// ```
pub fn format_mode(permissions: Permissions) -> String {
    let mode = permissions.mode();
    let specials = [
        (Permissions::SETUID, 's'),
        (Permissions::SETGID, 's'),
        (Permissions::STICKY, 't'),
    ];

    let mut out = String::with_capacity(9);
    for (index, (special_bit, glyph)) in specials.into_iter().enumerate() {
        let bits = (mode >> (6 - 3 * index)) & 0o7;
        out.push(if bits & 0o4 != 0 { 'r' } else { '-' });
        out.push(if bits & 0o2 != 0 { 'w' } else { '-' });
        let execute = bits & 0o1 != 0;
        out.push(match (mode & special_bit != 0, execute) {
            (true, true) => glyph,
            (true, false) => glyph.to_ascii_uppercase(),
            (false, true) => 'x',
            (false, false) => '-',
        });
    }
    out
}

fn default_mode(file_type: FileType, umask: u32) -> Permissions {
    let mode = match file_type {
        FileType::Symlink => return Permissions::from_mode(SYMLINK_MODE),
        FileType::Directory => DEFAULT_DIR_MODE,
        FileType::File => DEFAULT_FILE_MODE,
    };
    Permissions::from_mode(mode & !umask)
}

fn parse_text(text: &str) -> Option<Permissions> {
    let chars: Vec<char> = text.chars().collect();
    match chars.len() {
        // Leading type glyph, as printed by `ls -l`.
        10 => parse_symbolic(&chars[1..]),
        9 => parse_symbolic(&chars),
        3 => parse_octal(text).map(Permissions::from_mode),
        _ => None,
    }
}

fn parse_octal(text: &str) -> Option<u32> {
    if !text.chars().all(|c| c.is_digit(8)) {
        return None;
    }
    u32::from_str_radix(text, 8)
        .ok()
        .filter(|mode| *mode <= MAX_PLAIN_MODE)
}

fn parse_symbolic(chars: &[char]) -> Option<Permissions> {
    let special_bits = [Permissions::SETUID, Permissions::SETGID, Permissions::STICKY];

    let mut mode = 0;
    for (index, triplet) in chars.chunks(3).enumerate() {
        let (bits, special) = parse_triplet(triplet)?;
        mode |= bits << (6 - 3 * index);
        if special {
            mode |= special_bits[index];
        }
    }
    Some(Permissions::from_mode(mode))
}

/// Parse one `[r-][w-][xstST-]` triplet into its rwx bits and whether the
/// special bit for its position is set.
fn parse_triplet(triplet: &[char]) -> Option<(u32, bool)> {
    let [read, write, execute] = triplet else {
        return None;
    };

    let mut bits = match read {
        'r' => 0o4,
        '-' => 0,
        _ => return None,
    };
    bits |= match write {
        'w' => 0o2,
        '-' => 0,
        _ => return None,
    };
    let special = match execute {
        'x' => {
            bits |= 0o1;
            false
        }
        's' | 't' => {
            bits |= 0o1;
            true
        }
        'S' | 'T' => true,
        '-' => false,
        _ => return None,
    };
    Some((bits, special))
}
