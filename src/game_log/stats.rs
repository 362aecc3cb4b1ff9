use serde::Serialize;

pub const KD_UNAVAILABLE: &str = "--";
pub const KD_INFINITE: &str = "∞";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionStats {
    pub kill_total: u64,
    pub death_total: u64,
    pub current_killstreak: u64,
    pub max_killstreak: u64,
}

/// Display strings handed to the stats sink after every counted kill or death.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsLabels {
    pub current_killstreak: String,
    pub max_killstreak: String,
    pub session_kills: String,
    pub session_deaths: String,
    pub kd_ratio: String,
    pub vehicle: String,
}

impl SessionStats {
    pub fn record_kill(&mut self) {
        self.current_killstreak = self.current_killstreak.saturating_add(1);
        if self.current_killstreak > self.max_killstreak {
            self.max_killstreak = self.current_killstreak;
        }
        self.kill_total = self.kill_total.saturating_add(1);
    }

    pub fn record_death(&mut self) {
        self.current_killstreak = 0;
        self.death_total = self.death_total.saturating_add(1);
    }

    pub fn compute_kd(&self) -> String {
        if self.kill_total == 0 && self.death_total == 0 {
            return KD_UNAVAILABLE.to_string();
        }

        if self.death_total == 0 {
            return KD_INFINITE.to_string();
        }

        let ratio = self.kill_total as f64 / self.death_total as f64;
        format!("{ratio:.2}")
    }

    pub fn labels(&self, vehicle: &str) -> StatsLabels {
        StatsLabels {
            current_killstreak: format!("Current Killstreak: {}", self.current_killstreak),
            max_killstreak: format!("Max Killstreak: {}", self.max_killstreak),
            session_kills: format!("Total Session Kills: {}", self.kill_total),
            session_deaths: format!("Total Session Deaths: {}", self.death_total),
            kd_ratio: format!("KD Ratio: {}", self.compute_kd()),
            vehicle: vehicle.to_string(),
        }
    }
}
