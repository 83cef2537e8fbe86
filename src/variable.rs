//! Cluster topology constants and variable-to-site routing
//!
//! The cluster is fixed: 10 sites numbered 1..=10, 20 variables named
//! `x1`..`x20`. Even-indexed variables are replicated to every site;
//! odd-indexed variables are pinned to exactly one site.

/// Number of sites in the fixed cluster.
pub const NUM_SITES: u32 = 10;
/// Number of variables in the fixed cluster.
pub const NUM_VARIABLES: u32 = 20;
/// The commit time assigned to every variable's initial version.
pub const INITIAL_COMMIT_TIME: u64 = 0;

/// Returns the initial value `10 * index` written to every hosting site at startup.
pub fn initial_value(variable_index: u32) -> i64 {
    10 * variable_index as i64
}

/// True if `variable_index` is replicated (present at every site).
pub fn is_replicated(variable_index: u32) -> bool {
    variable_index % 2 == 0
}

/// The single site a non-replicated variable is pinned to.
pub fn home_site(variable_index: u32) -> u32 {
    1 + (variable_index % NUM_SITES)
}

/// All sites that should hold a copy of `variable_index`, in topology order.
pub fn sites_for(variable_index: u32) -> Vec<u32> {
    if is_replicated(variable_index) {
        (1..=NUM_SITES).collect()
    } else {
        vec![home_site(variable_index)]
    }
}

/// Parses a variable token like `"x7"` into its numeric index.
pub fn parse_variable(token: &str) -> Option<u32> {
    token.strip_prefix('x')?.parse().ok()
}

/// Formats a variable index back into its `x{i}` token form.
pub fn format_variable(variable_index: u32) -> String {
    format!("x{variable_index}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn even_variables_are_replicated_everywhere() {
        assert!(is_replicated(2));
        assert_eq!(sites_for(2), (1..=10).collect::<Vec<_>>());
    }

    #[test]
    fn odd_variables_are_pinned_to_one_site() {
        assert!(!is_replicated(1));
        assert_eq!(sites_for(1), vec![2]);
        assert_eq!(sites_for(11), vec![2]);
        assert_eq!(sites_for(19), vec![10]);
    }

    #[test]
    fn home_site_wraps_with_mod_ten() {
        assert_eq!(home_site(1), 2);
        assert_eq!(home_site(9), 10);
        assert_eq!(home_site(19), 10);
    }

    #[test]
    fn initial_value_is_ten_times_index() {
        assert_eq!(initial_value(1), 10);
        assert_eq!(initial_value(20), 200);
    }

    #[test]
    fn variable_token_round_trips() {
        assert_eq!(parse_variable("x7"), Some(7));
        assert_eq!(parse_variable("y7"), None);
        assert_eq!(format_variable(7), "x7");
    }
}
