//! Round importance as an ordinal stage

/// Stage for rounds that are not recognized (same as R32)
pub const DEFAULT_STAGE: u8 = 3;

/// Map a round code to its bracket stage
///
/// Qualifying rounds are 0, R128 is 1 through the final at 7. Round-robin
/// play sits mid-bracket with R16.
pub fn round_stage(round: &str) -> u8 {
    let code = round.trim().to_uppercase();
    if code.starts_with('Q') && code != "QF" {
        return 0;
    }
    match code.as_str() {
        "R128" => 1,
        "R64" => 2,
        "R32" => 3,
        "R16" | "RR" => 4,
        "QF" => 5,
        "SF" => 6,
        "F" => 7,
        _ => DEFAULT_STAGE,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_stages() {
        assert_eq!(round_stage("Q1"), 0);
        assert_eq!(round_stage("Q3"), 0);
        assert_eq!(round_stage("R128"), 1);
        assert_eq!(round_stage("R64"), 2);
        assert_eq!(round_stage("R16"), 4);
        assert_eq!(round_stage("QF"), 5);
        assert_eq!(round_stage("SF"), 6);
        assert_eq!(round_stage("F"), 7);
        assert_eq!(round_stage("RR"), 4);
    }

    #[test]
    fn test_unknown_round_defaults_to_r32() {
        assert_eq!(round_stage("BR"), round_stage("R32"));
        assert_eq!(round_stage(""), DEFAULT_STAGE);
    }
}
