use crate::error::ParseError;

/// Highest TCP port number.
pub const MAX_PORT: u16 = u16::MAX;

/// Parse a comma-separated port specification into an ordered list of TCP ports.
///
/// Supported tokens:
/// - single port number: `80`
/// - inclusive range: `8000-8010`
///
/// Ports are emitted in token order. Duplicates are kept, and a range whose
/// start is greater than its end expands to nothing.
///
/// When `scan_all` is true `spec` is ignored and every port
/// from 1 to 65535 is returned.
pub fn parse_ports(spec: &str, scan_all: bool) -> Result<Vec<u16>, ParseError> {
    if scan_all {
        return Ok(full_range());
    }

    let mut out: Vec<u16> = Vec::new();
    for raw in spec.split(',') {
        let token = raw.trim();

        if token.contains('-') {
            let parts: Vec<&str> = token.split('-').collect();
            if parts.len() != 2 {
                return Err(ParseError::InvalidRange(token.to_string()));
            }
            let start = parse_port_str(parts[0].trim())
                .map_err(|_| ParseError::InvalidRangeStart(parts[0].to_string()))?;
            let end = parse_port_str(parts[1].trim())
                .map_err(|_| ParseError::InvalidRangeEnd(parts[1].to_string()))?;
            if start <= end {
                out.extend(start..=end);
            }
            continue;
        }

        out.push(parse_port_str(token)?);
    }

    Ok(out)
}

/// Ports selected by an optional `-p` argument: absent or empty means every port.
pub fn ports_from_arg(arg: Option<&str>) -> Result<Vec<u16>, ParseError> {
    match arg.filter(|s| !s.is_empty()) {
        Some(spec) => parse_ports(spec, false),
        None => Ok(full_range()),
    }
}

/// Every TCP port, ascending.
pub fn full_range() -> Vec<u16> {
    (1..=MAX_PORT).collect()
}

fn parse_port_str(s: &str) -> Result<u16, ParseError> {
    let val: u32 = s
        .parse::<u32>()
        .map_err(|_| ParseError::InvalidPort(s.to_string()))?;
    if val == 0 || val > u32::from(MAX_PORT) {
        return Err(ParseError::OutOfRange(s.to_string()));
    }
    Ok(val as u16)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_single_ports() {
        let ports = parse_ports("80,22, 443 ", false).unwrap();
        assert_eq!(ports, vec![80, 22, 443]);
    }

    #[test]
    fn parse_keeps_duplicates_in_token_order() {
        let ports = parse_ports("8000-8002,80,8001", false).unwrap();
        assert_eq!(ports, vec![8000, 8001, 8002, 80, 8001]);
    }

    #[test]
    fn reversed_range_is_empty() {
        assert_eq!(parse_ports("90-80", false).unwrap(), Vec::<u16>::new());
        assert_eq!(parse_ports("22,90-80,23", false).unwrap(), vec![22, 23]);
    }

    #[test]
    fn scan_all_ignores_spec() {
        let ports = parse_ports("not a spec", true).unwrap();
        assert_eq!(ports.len(), 65535);
        assert_eq!(ports.first(), Some(&1));
        assert_eq!(ports.last(), Some(&65535));
    }

    #[test]
    fn invalid_values_error() {
        assert_eq!(
            parse_ports("70000", false),
            Err(ParseError::OutOfRange("70000".into()))
        );
        assert_eq!(parse_ports("0", false), Err(ParseError::OutOfRange("0".into())));
        assert_eq!(parse_ports("", false), Err(ParseError::InvalidPort("".into())));
        assert_eq!(
            parse_ports("22,", false),
            Err(ParseError::InvalidPort("".into()))
        );
    }

    #[test]
    fn range_errors_name_the_offending_part() {
        assert_eq!(
            parse_ports("x-80", false),
            Err(ParseError::InvalidRangeStart("x".into()))
        );
        assert_eq!(
            parse_ports("80-", false),
            Err(ParseError::InvalidRangeEnd("".into()))
        );
        assert_eq!(
            parse_ports("80-70-60", false),
            Err(ParseError::InvalidRange("80-70-60".into()))
        );
    }
}
