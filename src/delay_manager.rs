use std::thread;
use std::time::Duration;

use log::{debug, info};
use rand::Rng;

use crate::config::Pacing;

/// Fixed wait after a page load for client-side rendering to finish.
pub fn settle(pacing: &Pacing) {
    let delay = pacing.settle();
    if delay.is_zero() {
        return;
    }
    debug!("Waiting {} ms for the page to settle", delay.as_millis());
    thread::sleep(delay);
}

/// Random pause between listing pages.
pub fn random_page_delay(pacing: &Pacing) {
    let min = pacing.page_delay_min_secs;
    let max = pacing.page_delay_max_secs.max(min);
    if max == 0 {
        return;
    }
    let delay_secs = rand::thread_rng().gen_range(min..=max);
    info!("Waiting for {} seconds (Page Delay)...", delay_secs);
    thread::sleep(Duration::from_secs(delay_secs));
}
