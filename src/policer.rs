//! Token-bucket rate limiting for command dispatch.
//!
//! Each bucket fills by one on every accepted command and drains at a
//! fixed rate; once full, further commands are dropped until it drains.
//! The parameter set is supplied per call so the dispatcher can pick the
//! class (god/oper/luser) the caller currently belongs to.

use crate::conf::PolicerConf;

#[derive(Debug, Clone, Default)]
pub struct Policer {
    level: f64,
    last_req: u64,
}

impl Policer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Debit the bucket for one command at time `now`; `false` means the
    /// command should be dropped.
    pub fn accept(&mut self, now: u64, params: &PolicerConf) -> bool {
        if now > self.last_req {
            self.level -= params.drain_rate * (now - self.last_req) as f64;
            if self.level < 0.0 {
                self.level = 0.0;
            }
            self.last_req = now;
        }
        if self.level < params.size {
            self.level += 1.0;
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bursts_cap_at_bucket_size() {
        let params = PolicerConf {
            size: 3.0,
            drain_rate: 1.0,
        };
        let mut p = Policer::new();
        assert!(p.accept(100, &params));
        assert!(p.accept(100, &params));
        assert!(p.accept(100, &params));
        assert!(!p.accept(100, &params));
    }

    #[test]
    fn bucket_drains_over_time() {
        let params = PolicerConf {
            size: 2.0,
            drain_rate: 0.5,
        };
        let mut p = Policer::new();
        assert!(p.accept(0, &params));
        assert!(p.accept(0, &params));
        assert!(!p.accept(0, &params));
        // Two seconds drains one token.
        assert!(p.accept(2, &params));
    }
}
