use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct Metrics {
    items_claimed: AtomicU64,
    items_done: AtomicU64,
    items_retried: AtomicU64,
    awards_issued: AtomicU64,
    badges_published: AtomicU64,
    loop_errors: AtomicU64,
}

impl Metrics {
    pub fn record_claimed(&self, count: usize) {
        self.items_claimed.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn record_done(&self, count: usize) {
        self.items_done.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn record_retried(&self) {
        self.items_retried.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_award(&self) {
        self.awards_issued.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_badge(&self) {
        self.badges_published.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_loop_error(&self) {
        self.loop_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn render_prometheus(&self) -> String {
        let claimed = self.items_claimed.load(Ordering::Relaxed);
        let done = self.items_done.load(Ordering::Relaxed);
        let retried = self.items_retried.load(Ordering::Relaxed);
        let awards = self.awards_issued.load(Ordering::Relaxed);
        let badges = self.badges_published.load(Ordering::Relaxed);
        let loop_errors = self.loop_errors.load(Ordering::Relaxed);

        format!(
            "# TYPE achievements_items_claimed_total counter\n\
achievements_items_claimed_total {}\n\
# TYPE achievements_items_done_total counter\n\
achievements_items_done_total {}\n\
# TYPE achievements_items_retried_total counter\n\
achievements_items_retried_total {}\n\
# TYPE achievements_awards_issued_total counter\n\
achievements_awards_issued_total {}\n\
# TYPE achievements_badges_published_total counter\n\
achievements_badges_published_total {}\n\
# TYPE achievements_loop_errors_total counter\n\
achievements_loop_errors_total {}\n",
            claimed, done, retried, awards, badges, loop_errors
        )
    }
}
