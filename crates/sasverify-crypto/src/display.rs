//! Human-comparable rendering of SAS bytes.
//!
//! Two renderings are supported, both computed from bytes returned by
//! [`EstablishedSas::generate_bytes`](crate::EstablishedSas::generate_bytes):
//!
//! - **Decimal**: the first 40 bits split into three 13-bit numbers, each
//!   offset by 1000 so every number has four digits (1000..=9191).
//! - **Emoji**: the first 42 bits split into seven 6-bit indices into a
//!   64-entry emoji table.

use std::fmt::Write;

use subtle::ConstantTimeEq;

/// Bytes consumed by the decimal rendering.
pub const DECIMAL_BYTES: usize = 5;

/// Bytes consumed by the emoji rendering.
pub const EMOJI_BYTES: usize = 6;

/// Number of emoji shown to the user.
pub const EMOJI_COUNT: usize = 7;

/// Emoji and their English names, indexed by 6-bit value.
pub const EMOJI_TABLE: [(&str, &str); 64] = [
    ("🐶", "Dog"),
    ("🐱", "Cat"),
    ("🦁", "Lion"),
    ("🐎", "Horse"),
    ("🦄", "Unicorn"),
    ("🐷", "Pig"),
    ("🐘", "Elephant"),
    ("🐰", "Rabbit"),
    ("🐼", "Panda"),
    ("🐓", "Rooster"),
    ("🐧", "Penguin"),
    ("🐢", "Turtle"),
    ("🐟", "Fish"),
    ("🐙", "Octopus"),
    ("🦋", "Butterfly"),
    ("🌷", "Flower"),
    ("🌳", "Tree"),
    ("🌵", "Cactus"),
    ("🍄", "Mushroom"),
    ("🌏", "Globe"),
    ("🌙", "Moon"),
    ("☁️", "Cloud"),
    ("🔥", "Fire"),
    ("🍌", "Banana"),
    ("🍎", "Apple"),
    ("🍓", "Strawberry"),
    ("🌽", "Corn"),
    ("🍕", "Pizza"),
    ("🎂", "Cake"),
    ("❤️", "Heart"),
    ("😀", "Smiley"),
    ("🤖", "Robot"),
    ("🎩", "Hat"),
    ("👓", "Glasses"),
    ("🔧", "Spanner"),
    ("🎅", "Santa"),
    ("👍", "Thumbs Up"),
    ("☂️", "Umbrella"),
    ("⌛", "Hourglass"),
    ("⏰", "Clock"),
    ("🎁", "Gift"),
    ("💡", "Light Bulb"),
    ("📕", "Book"),
    ("✏️", "Pencil"),
    ("📎", "Paperclip"),
    ("✂️", "Scissors"),
    ("🔒", "Lock"),
    ("🔑", "Key"),
    ("🔨", "Hammer"),
    ("☎️", "Telephone"),
    ("🏁", "Flag"),
    ("🚂", "Train"),
    ("🚲", "Bicycle"),
    ("✈️", "Aeroplane"),
    ("🚀", "Rocket"),
    ("🏆", "Trophy"),
    ("⚽", "Ball"),
    ("🎸", "Guitar"),
    ("🎺", "Trumpet"),
    ("🔔", "Bell"),
    ("⚓", "Anchor"),
    ("🎧", "Headphones"),
    ("📁", "Folder"),
    ("📌", "Pin"),
];

/// Rendering method for a short authentication string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SasMethod {
    #[default]
    Emoji,
    Decimal,
}

/// The rendered forms of one set of SAS bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShortAuthString {
    bytes: [u8; EMOJI_BYTES],
}

impl ShortAuthString {
    /// The three four-digit numbers.
    pub fn decimals(&self) -> (u16, u16, u16) {
        let mut first = [0u8; DECIMAL_BYTES];
        first.copy_from_slice(&self.bytes[..DECIMAL_BYTES]);
        decimals(&first)
    }

    /// Indices into [`EMOJI_TABLE`].
    pub fn emoji_indices(&self) -> [u8; EMOJI_COUNT] {
        emoji_indices(&self.bytes)
    }

    /// The emoji with their names.
    pub fn emojis(&self) -> [(&'static str, &'static str); EMOJI_COUNT] {
        emojis(&self.bytes)
    }

    /// Render using `method`.
    pub fn render(&self, method: SasMethod, with_names: bool) -> String {
        match method {
            SasMethod::Decimal => format_decimals(self.decimals()),
            SasMethod::Emoji => format_emojis(&self.emojis(), with_names),
        }
    }

    /// Constant-time comparison against the peer's rendering bytes.
    pub fn matches(&self, other: &Self) -> bool {
        bool::from(self.bytes.ct_eq(&other.bytes))
    }
}

/// Build a [`ShortAuthString`] from generated bytes.
pub const fn short_auth_string(bytes: &[u8; EMOJI_BYTES]) -> ShortAuthString {
    ShortAuthString { bytes: *bytes }
}

/// Split 40 bits into three 13-bit numbers, each offset by 1000.
pub fn decimals(bytes: &[u8; DECIMAL_BYTES]) -> (u16, u16, u16) {
    let b: [u16; DECIMAL_BYTES] = bytes.map(u16::from);
    let first = (b[0] << 5) | (b[1] >> 3);
    let second = ((b[1] & 0x07) << 10) | (b[2] << 2) | (b[3] >> 6);
    let third = ((b[3] & 0x3F) << 7) | (b[4] >> 1);
    (first + 1000, second + 1000, third + 1000)
}

/// Split the first 42 bits into seven 6-bit indices.
pub fn emoji_indices(bytes: &[u8; EMOJI_BYTES]) -> [u8; EMOJI_COUNT] {
    let num = bytes
        .iter()
        .fold(0u64, |acc, &b| (acc << 8) | u64::from(b));
    let mut out = [0u8; EMOJI_COUNT];
    for (i, slot) in out.iter_mut().enumerate() {
        let shift = 42 - 6 * i;
        #[allow(clippy::cast_possible_truncation)] // masked to 6 bits
        {
            *slot = ((num >> shift) & 0x3F) as u8;
        }
    }
    out
}

/// Look up the emoji for generated bytes.
pub fn emojis(bytes: &[u8; EMOJI_BYTES]) -> [(&'static str, &'static str); EMOJI_COUNT] {
    emoji_indices(bytes).map(|i| EMOJI_TABLE[usize::from(i)])
}

/// Format three decimals as `"1234 5678 9012"`.
pub fn format_decimals((a, b, c): (u16, u16, u16)) -> String {
    format!("{a} {b} {c}")
}

/// Format emoji on one line, optionally followed by their names.
pub fn format_emojis(emojis: &[(&str, &str)], with_names: bool) -> String {
    let symbols: Vec<&str> = emojis.iter().map(|(emoji, _)| *emoji).collect();
    let mut output = symbols.join("  ");
    if with_names {
        let names: Vec<&str> = emojis.iter().map(|(_, name)| *name).collect();
        let _ = write!(output, "\n{}", names.join(", "));
    }
    output
}

/// Render two short authentication strings side by side.
///
/// Returns the formatted text and whether they match.
pub fn compare_sas(
    local: &ShortAuthString,
    local_label: &str,
    remote: &ShortAuthString,
    remote_label: &str,
    method: SasMethod,
) -> (String, bool) {
    let matches = local.matches(remote);

    let mut output = String::new();
    let _ = writeln!(output, "{local_label}: {}", local.render(method, false));
    let _ = writeln!(output, "{remote_label}: {}", remote.render(method, false));

    if matches {
        output.push_str("\nSAS MATCH");
    } else {
        output.push_str("\nSAS DOES NOT MATCH — possible MITM attack!");
    }

    (output, matches)
}
