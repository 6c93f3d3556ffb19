use anyhow::Result;
use chrono::{Local, Timelike};
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{error, info, warn};

use crate::config::{WorkingHours, FACILITIES};
use crate::poller::AvailabilityClient;
use crate::session::browser::Browser;
use crate::session::SessionManager;

#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Sleep between rounds that found nothing.
    pub interval: Duration,
    pub max_rounds: u32,
    /// Back-off after an unexpected round failure; long enough to outlast a
    /// temporary block by the portal.
    pub cooldown: Duration,
    /// Let the appointment page settle after login before hitting the JSON
    /// endpoints.
    pub stabilize: Duration,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(60),
            max_rounds: 60,
            cooldown: Duration::from_secs(60 * 60),
            stabilize: Duration::from_secs(2),
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
enum RoundOutcome {
    Rescheduled {
        facility: String,
        date: String,
        time: String,
    },
    SessionExpired,
    NothingFound,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    Rescheduled {
        facility: String,
        date: String,
        time: String,
    },
    RetriesExhausted,
    OutsideWorkingHours,
}

/// Drives rounds of login -> poll-facilities -> reschedule-or-wait until a
/// slot is rebooked or the attempt budget runs out.
pub struct RescheduleService<B: Browser> {
    session: SessionManager<B>,
    client: AvailabilityClient,
    working_hours: Option<WorkingHours>,
    opts: RunOptions,
}

impl<B: Browser> RescheduleService<B> {
    pub fn new(
        session: SessionManager<B>,
        client: AvailabilityClient,
        working_hours: Option<WorkingHours>,
        opts: RunOptions,
    ) -> Self {
        Self {
            session,
            client,
            working_hours,
            opts,
        }
    }

    pub fn into_session(self) -> SessionManager<B> {
        self.session
    }

    pub async fn run(&mut self) -> Result<RunOutcome> {
        let mut round: u32 = 0;

        while round < self.opts.max_rounds {
            if let Some(hours) = self.working_hours {
                let hour = Local::now().hour();
                if !hours.contains(hour) {
                    info!(hour, "outside working hours, stopping");
                    return Ok(RunOutcome::OutsideWorkingHours);
                }
            }

            info!(round = round + 1, max = self.opts.max_rounds, "round start");
            let started = Instant::now();
            let outcome = self.run_round().await;
            // Counts failed rounds too, so the budget always drains.
            round += 1;

            match outcome {
                Ok(RoundOutcome::Rescheduled {
                    facility,
                    date,
                    time,
                }) => {
                    info!(
                        facility = %facility,
                        date = %date,
                        time = %time,
                        elapsed_secs = started.elapsed().as_secs(),
                        "round end"
                    );
                    return Ok(RunOutcome::Rescheduled {
                        facility,
                        date,
                        time,
                    });
                }
                Ok(RoundOutcome::SessionExpired) => {
                    info!(
                        elapsed_secs = started.elapsed().as_secs(),
                        "session expired mid-round, retrying with a fresh login"
                    );
                }
                Ok(RoundOutcome::NothingFound) => {
                    info!(
                        elapsed_secs = started.elapsed().as_secs(),
                        wait_secs = self.opts.interval.as_secs(),
                        "no earlier date found, waiting"
                    );
                    sleep(self.opts.interval).await;
                }
                Err(e) => {
                    error!(
                        error = %e,
                        cooldown_secs = self.opts.cooldown.as_secs(),
                        "round failed, cooling down"
                    );
                    sleep(self.opts.cooldown).await;
                }
            }
        }

        info!(rounds = self.opts.max_rounds, "retry budget exhausted");
        Ok(RunOutcome::RetriesExhausted)
    }

    async fn run_round(&mut self) -> Result<RoundOutcome> {
        self.session.ensure_session().await?;
        sleep(self.opts.stabilize).await;

        for &(facility, facility_id) in FACILITIES {
            // A 401 anywhere invalidates the session; stop polling the
            // remaining facilities and go straight to a fresh login.
            if !self.session.is_authenticated() {
                return Ok(RoundOutcome::SessionExpired);
            }

            info!(facility, "checking for an earlier date");
            let Some(date) = self
                .client
                .find_earlier_date(&mut self.session, facility_id)
                .await?
            else {
                info!(facility, "no earlier date");
                continue;
            };

            info!(facility, date = %date, "found earlier date, trying to reschedule");
            let Some(time) = self
                .client
                .find_available_time(&mut self.session, &date, facility_id)
                .await?
            else {
                warn!(facility, date = %date, "no available time for that date");
                continue;
            };

            if self
                .client
                .reschedule(&mut self.session, facility_id, &date, &time)
                .await?
            {
                // First success ends the round; never rebook twice.
                return Ok(RoundOutcome::Rescheduled {
                    facility: facility.to_string(),
                    date,
                    time,
                });
            }
        }

        if !self.session.is_authenticated() {
            return Ok(RoundOutcome::SessionExpired);
        }
        Ok(RoundOutcome::NothingFound)
    }
}
