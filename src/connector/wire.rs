//! Text rendering for PostgreSQL binary values that have no native Rust mapping.
//! Every decoder returns `None` when the bytes are malformed.

use std::net::{Ipv4Addr, Ipv6Addr};

const NUMERIC_POS: u16 = 0x0000;
const NUMERIC_NEG: u16 = 0x4000;
const NUMERIC_NAN: u16 = 0xC000;
const NUMERIC_PINF: u16 = 0xD000;
const NUMERIC_NINF: u16 = 0xF000;

const PGSQL_AF_INET: u8 = 2;
const PGSQL_AF_INET6: u8 = 3;

const MICROS_PER_SEC: i64 = 1_000_000;

fn be_i16(b: &[u8], at: usize) -> Option<i16> {
    Some(i16::from_be_bytes(b.get(at..at + 2)?.try_into().ok()?))
}

fn be_i32(b: &[u8], at: usize) -> Option<i32> {
    Some(i32::from_be_bytes(b.get(at..at + 4)?.try_into().ok()?))
}

fn be_i64(b: &[u8], at: usize) -> Option<i64> {
    Some(i64::from_be_bytes(b.get(at..at + 8)?.try_into().ok()?))
}

/// NUMERIC: header of ndigits, weight, sign and dscale, then base-10000 digit groups.
/// Group `k` carries the power `10000^(weight - k)`; groups past the end are zero.
pub fn decode_numeric(bytes: &[u8]) -> Option<String> {
    let ndigits = usize::try_from(be_i16(bytes, 0)?).ok()?;
    let weight = i32::from(be_i16(bytes, 2)?);
    let sign = be_i16(bytes, 4)? as u16;
    let dscale = usize::try_from(be_i16(bytes, 6)?).ok()?;
    match sign {
        NUMERIC_NAN => return Some("NaN".to_string()),
        NUMERIC_PINF => return Some("Infinity".to_string()),
        NUMERIC_NINF => return Some("-Infinity".to_string()),
        NUMERIC_POS | NUMERIC_NEG => {}
        _ => return None,
    }
    let body = bytes.get(8..8 + ndigits * 2)?;
    let groups: Vec<u16> = body.chunks_exact(2).map(|c| u16::from_be_bytes([c[0], c[1]])).collect();
    if groups.iter().any(|g| *g >= 10_000) {
        return None;
    }
    let group = |k: i32| usize::try_from(k).ok().and_then(|k| groups.get(k).copied()).unwrap_or(0);

    let mut out = String::new();
    if sign == NUMERIC_NEG {
        out.push('-');
    }
    if weight < 0 {
        out.push('0');
    } else {
        out.push_str(&group(0).to_string());
        for k in 1..=weight {
            out.push_str(&format!("{:04}", group(k)));
        }
    }
    if dscale > 0 {
        let mut frac = String::with_capacity(dscale + 4);
        let mut k = weight + 1;
        while frac.len() < dscale {
            frac.push_str(&format!("{:04}", group(k)));
            k += 1;
        }
        frac.truncate(dscale);
        out.push('.');
        out.push_str(&frac);
    }
    Some(out)
}

fn plural(n: i64) -> &'static str { if n == 1 { "" } else { "s" } }

/// `HH:MM:SS` with up to six fractional digits, trailing zeros dropped. Hours may exceed 24.
fn clock(micros: u64) -> String {
    let secs = micros / MICROS_PER_SEC as u64;
    let frac = micros % MICROS_PER_SEC as u64;
    let mut out = format!("{:02}:{:02}:{:02}", secs / 3600, secs / 60 % 60, secs % 60);
    if frac > 0 {
        let digits = format!("{frac:06}");
        out.push('.');
        out.push_str(digits.trim_end_matches('0'));
    }
    out
}

/// INTERVAL: microseconds (i64), days (i32), months (i32). Rendered in the server's
/// default `postgres` interval style, e.g. `1 year 2 mons -3 days +04:05:06.5`.
pub fn decode_interval(bytes: &[u8]) -> Option<String> {
    if bytes.len() != 16 {
        return None;
    }
    let micros = be_i64(bytes, 0)?;
    let days = i64::from(be_i32(bytes, 8)?);
    let months = i64::from(be_i32(bytes, 12)?);
    Some(format_interval(months, days, micros))
}

pub fn format_interval(months: i64, days: i64, micros: i64) -> String {
    let (years, mons) = (months / 12, months % 12);
    let mut parts: Vec<String> = Vec::new();
    let mut any_negative = false;
    for (n, unit) in [(years, "year"), (mons, "mon"), (days, "day")] {
        if n != 0 {
            any_negative |= n < 0;
            parts.push(format!("{n} {unit}{}", plural(n)));
        }
    }
    if micros != 0 || parts.is_empty() {
        let sign = if micros < 0 {
            "-"
        } else if any_negative {
            "+"
        } else {
            ""
        };
        parts.push(format!("{sign}{}", clock(micros.unsigned_abs())));
    }
    parts.join(" ")
}

/// TIMETZ: microseconds since midnight (i64), then the zone offset in seconds west of UTC.
pub fn decode_timetz(bytes: &[u8]) -> Option<String> {
    if bytes.len() != 12 {
        return None;
    }
    let micros = u64::try_from(be_i64(bytes, 0)?).ok()?;
    let east = -i64::from(be_i32(bytes, 8)?);
    let sign = if east < 0 { '-' } else { '+' };
    let off = east.unsigned_abs();
    let mut out = format!("{}{sign}{:02}", clock(micros), off / 3600);
    if off % 3600 != 0 {
        out.push_str(&format!(":{:02}", off / 60 % 60));
        if off % 60 != 0 {
            out.push_str(&format!(":{:02}", off % 60));
        }
    }
    Some(out)
}

/// INET and CIDR: family, prefix bits, cidr flag, address length, address bytes.
/// The prefix is shown for CIDR values and for INET values narrower than a host address.
pub fn decode_inet(bytes: &[u8]) -> Option<String> {
    let (&family, rest) = bytes.split_first()?;
    let [bits, is_cidr, nb, addr @ ..] = rest else { return None };
    if usize::from(*nb) != addr.len() {
        return None;
    }
    let (text, full) = match family {
        PGSQL_AF_INET => {
            let octets: [u8; 4] = addr.try_into().ok()?;
            (Ipv4Addr::from(octets).to_string(), 32)
        }
        PGSQL_AF_INET6 => {
            let octets: [u8; 16] = addr.try_into().ok()?;
            (Ipv6Addr::from(octets).to_string(), 128)
        }
        _ => return None,
    };
    if *bits > full {
        return None;
    }
    if *is_cidr != 0 || *bits != full {
        Some(format!("{text}/{bits}"))
    } else {
        Some(text)
    }
}

/// MONEY: a signed count of the currency's minor unit, shown with two decimals and no symbol.
pub fn decode_money(bytes: &[u8]) -> Option<String> {
    if bytes.len() != 8 {
        return None;
    }
    let cents = be_i64(bytes, 0)?;
    let sign = if cents < 0 { "-" } else { "" };
    let abs = cents.unsigned_abs();
    Some(format!("{sign}{}.{:02}", abs / 100, abs % 100))
}

/// MACADDR: six bytes as lower-case colon-separated hex.
pub fn decode_macaddr(bytes: &[u8]) -> Option<String> {
    if bytes.len() != 6 {
        return None;
    }
    Some(bytes.iter().map(|b| format!("{b:02x}")).collect::<Vec<_>>().join(":"))
}
