use serde::Deserialize;

use crate::foundation::core::Rgb8;

impl std::str::FromStr for Rgb8 {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Some(body) = s.strip_prefix("rgb(").and_then(|b| b.strip_suffix(')')) {
            return parse_rgb_fn(body);
        }
        parse_hex(s)
    }
}

impl<'de> Deserialize<'de> for Rgb8 {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Str(String),
            Obj { r: u8, g: u8, b: u8 },
            Arr(Vec<u8>),
        }

        match Repr::deserialize(deserializer)? {
            Repr::Str(s) => s.parse().map_err(serde::de::Error::custom),
            Repr::Obj { r, g, b } => Ok(Rgb8::new(r, g, b)),
            Repr::Arr(v) => match v.as_slice() {
                [r, g, b] => Ok(Rgb8::new(*r, *g, *b)),
                _ => Err(serde::de::Error::custom(
                    "rgb array must have exactly 3 channels ([r,g,b])",
                )),
            },
        }
    }
}

fn parse_rgb_fn(body: &str) -> Result<Rgb8, String> {
    let parts = body.split(',').map(str::trim).collect::<Vec<_>>();
    let [r, g, b] = parts[..] else {
        return Err(format!("rgb() needs 3 components, got {}", parts.len()));
    };
    let channel = |v: &str| {
        v.parse::<u8>()
            .map_err(|_| format!("invalid rgb() component \"{v}\" (expected 0..=255)"))
    };
    Ok(Rgb8::new(channel(r)?, channel(g)?, channel(b)?))
}

fn parse_hex(s: &str) -> Result<Rgb8, String> {
    let s = s.strip_prefix('#').unwrap_or(s);

    fn hex_byte(pair: &str) -> Result<u8, String> {
        u8::from_str_radix(pair, 16).map_err(|_| format!("invalid hex byte \"{pair}\""))
    }

    if s.len() != 6 || !s.is_ascii() {
        return Err("color must be rgb(r,g,b) or #RRGGBB (case-insensitive)".to_owned());
    }
    Ok(Rgb8::new(
        hex_byte(&s[0..2])?,
        hex_byte(&s[2..4])?,
        hex_byte(&s[4..6])?,
    ))
}
