//! NAT rule-table listing and destination-port extraction.
//!
//! This module invokes the host firewall tool's NAT table listing
//! (`iptables -t nat -S`) and extracts the destination ports already
//! claimed by DNAT/publish rules. A claimed port counts as used even when
//! no live socket exists yet, covering the window between a forwarding
//! rule being installed and a process actually binding.
//!
//! The rule grammar itself is environment-supplied; only destination-port
//! integers are consumed here.

use std::process::Command;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{Error, Result};

const IPTABLES: &str = "iptables";

static DPORT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"--dport (\d+)(?::(\d+))?").expect("destination port pattern"));

/// Lists the NAT table rules, one rule specification per line.
///
/// # Errors
///
/// Returns [`Error::RuleListing`] if the listing tool cannot be invoked or
/// exits with a failure status.
///
/// # Examples
///
/// ```no_run
/// use hostport::nat::{destination_ports, list_nat_rules};
///
/// let rules = list_nat_rules().unwrap();
/// let claimed = destination_ports(&rules);
/// println!("{} port(s) claimed by NAT rules", claimed.len());
/// ```
pub fn list_nat_rules() -> Result<Vec<String>> {
    let output = Command::new(IPTABLES)
        .args(["-t", "nat", "-S"])
        .output()
        .map_err(|err| Error::RuleListing {
            details: format!("failed to run {IPTABLES}: {err}"),
        })?;

    if !output.status.success() {
        return Err(Error::RuleListing {
            details: format!(
                "{IPTABLES} exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            ),
        });
    }

    Ok(String::from_utf8_lossy(&output.stdout)
        .lines()
        .map(str::to_owned)
        .collect())
}

/// Extracts destination ports from DNAT rule specifications.
///
/// Both the single-port form (`--dport 8080`) and the range form
/// (`--dport 8080:8090`) are recognized; a range claims every port in it.
/// Rules without a DNAT target and ports that do not fit in `u16` are
/// ignored.
///
/// # Examples
///
/// ```
/// use hostport::nat::destination_ports;
///
/// let rules = vec![
///     "-A DOCKER ! -i docker0 -p tcp -m tcp --dport 8080 -j DNAT --to-destination 172.17.0.2:80".to_string(),
///     "-A POSTROUTING -s 172.17.0.0/16 ! -o docker0 -j MASQUERADE".to_string(),
/// ];
/// assert_eq!(destination_ports(&rules), vec![8080]);
/// ```
#[must_use]
pub fn destination_ports(rules: &[String]) -> Vec<u16> {
    let mut ports = Vec::new();
    for rule in rules {
        if !rule.contains("DNAT") {
            continue;
        }
        for caps in DPORT_RE.captures_iter(rule) {
            let Some(start) = caps.get(1).and_then(|m| m.as_str().parse::<u16>().ok()) else {
                continue;
            };
            match caps.get(2).and_then(|m| m.as_str().parse::<u16>().ok()) {
                Some(end) if end >= start => ports.extend(start..=end),
                Some(_) => {}
                None => ports.push(start),
            }
        }
    }
    ports
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rules(specs: &[&str]) -> Vec<String> {
        specs.iter().map(|s| (*s).to_string()).collect()
    }

    #[test]
    fn test_destination_ports_single() {
        let input = rules(&[
            "-P PREROUTING ACCEPT",
            "-A PREROUTING -m addrtype --dst-type LOCAL -j DOCKER",
            "-A DOCKER ! -i docker0 -p tcp -m tcp --dport 49153 -j DNAT --to-destination 10.4.0.2:80",
            "-A DOCKER ! -i docker0 -p udp -m udp --dport 50000 -j DNAT --to-destination 10.4.0.3:53",
        ]);
        assert_eq!(destination_ports(&input), vec![49153, 50000]);
    }

    #[test]
    fn test_destination_ports_range_form() {
        let input = rules(&[
            "-A DOCKER -p tcp -m tcp --dport 49160:49162 -j DNAT --to-destination 10.4.0.2:80",
        ]);
        assert_eq!(destination_ports(&input), vec![49160, 49161, 49162]);
    }

    #[test]
    fn test_destination_ports_ignores_non_dnat_rules() {
        let input = rules(&[
            "-A POSTROUTING -s 10.4.0.0/24 -j MASQUERADE",
            "-A INPUT -p tcp -m tcp --dport 22 -j ACCEPT",
        ]);
        assert!(destination_ports(&input).is_empty());
    }

    #[test]
    fn test_destination_ports_skips_unparseable_ports() {
        let input = rules(&[
            "-A DOCKER -p tcp -m tcp --dport 99999 -j DNAT --to-destination 10.4.0.2:80",
            "-A DOCKER -p tcp -m tcp --dport 49200 -j DNAT --to-destination 10.4.0.2:81",
        ]);
        assert_eq!(destination_ports(&input), vec![49200]);
    }

    #[test]
    fn test_destination_ports_inverted_range_ignored() {
        let input = rules(&[
            "-A DOCKER -p tcp -m tcp --dport 49162:49160 -j DNAT --to-destination 10.4.0.2:80",
        ]);
        assert!(destination_ports(&input).is_empty());
    }

    #[test]
    fn test_destination_ports_empty_input() {
        assert!(destination_ports(&[]).is_empty());
    }
}
