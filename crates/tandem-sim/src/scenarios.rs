use std::time::Duration;

use clap::ValueEnum;
use tandem_core::{TransferClass, UserInfoRecord};
use tandem_node::config::{MissedItemPolicy, SubsystemConfig};
use tandem_node::events::{Event, EventName, SubscriptionId};
use tandem_node::runtime::{spawn_subsystem, SubsystemHandle};
use tandem_node::service::TransferService;
use tandem_transport::adapter::{in_memory_pair, InMemoryPeer};
use tokio::task::JoinHandle;
use tokio::time::{interval, sleep, Instant, MissedTickBehavior};
use tracing::{info, warn};

use crate::device::{
    first_canned_record, second_canned_record, DeviceBehavior, PairedDevice,
    REQUEST_MORE_USER_INFO, REQUEST_USER_INFO,
};
use crate::error::SimError;

/// The four user-info scenarios a paired-device session exercises.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Scenario {
    TransferUserInfo,
    TransferComplicationUserInfo,
    SubscribeToUserInfo,
    UserInfoQueue,
}

impl Scenario {
    pub const ALL: [Scenario; 4] = [
        Scenario::TransferUserInfo,
        Scenario::TransferComplicationUserInfo,
        Scenario::SubscribeToUserInfo,
        Scenario::UserInfoQueue,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Scenario::TransferUserInfo => "transfer user info",
            Scenario::TransferComplicationUserInfo => "transfer complication user info",
            Scenario::SubscribeToUserInfo => "subscribe to user info",
            Scenario::UserInfoQueue => "user info queue",
        }
    }
}

/// Sample payload used by the transfer scenarios.
pub fn sample_payload() -> UserInfoRecord {
    UserInfoRecord::new().with("uid", "xyz").with("name", "bob")
}

fn request(text: &str) -> UserInfoRecord {
    UserInfoRecord::new().with("test", true).with("text", text)
}

/// A running subsystem wired to a simulated paired device.
pub struct SimHarness {
    subsystem: SubsystemHandle,
    peer: InMemoryPeer,
    config: SubsystemConfig,
    device_task: JoinHandle<()>,
    subsystem_task: Option<JoinHandle<()>>,
}

impl SimHarness {
    /// Spawns the subsystem and a device task stepping on `poll_interval`.
    pub fn start(config: SubsystemConfig, behavior: DeviceBehavior) -> Self {
        let config = config.normalized();
        let (adapter, peer) = in_memory_pair();
        let (subsystem, subsystem_task) =
            spawn_subsystem(TransferService::with_transport(config.clone(), adapter));

        let mut device = PairedDevice::new(peer.clone(), behavior);
        let period = config.poll_interval;
        let device_task = tokio::spawn(async move {
            let mut tick = interval(period);
            tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tick.tick().await;
                device.step();
            }
        });

        Self {
            subsystem,
            peer,
            config,
            device_task,
            subsystem_task: Some(subsystem_task),
        }
    }

    pub fn subsystem(&self) -> &SubsystemHandle {
        &self.subsystem
    }

    pub fn peer(&self) -> &InMemoryPeer {
        &self.peer
    }

    /// Registers a user-info handler that always succeeds.
    pub async fn subscribe_user_info<F>(
        &self,
        mut on_records: F,
    ) -> Result<SubscriptionId, SimError>
    where
        F: FnMut(&[UserInfoRecord]) + Send + 'static,
    {
        let id = self
            .subsystem
            .subscribe(EventName::UserInfo, move |event| {
                if let Event::UserInfo(records) = event {
                    on_records(records.as_slice());
                }
                Ok(())
            })
            .await?;
        Ok(id)
    }

    /// Upper bound for waits: one acknowledgment timeout.
    fn wait_limit(&self) -> Duration {
        self.config.ack_timeout
    }

    /// Waits until the subsystem has decoded `count` more inbound user-info
    /// records than `baseline`.
    pub async fn wait_for_user_info(&self, baseline: usize, count: usize) -> Result<(), SimError> {
        let give_up = Instant::now() + self.wait_limit();
        loop {
            let stats = self.subsystem.stats().await?;
            if stats.inbound_user_info >= baseline + count {
                return Ok(());
            }
            if Instant::now() >= give_up {
                return Err(SimError::Timeout("inbound user info"));
            }
            sleep(self.config.poll_interval).await;
        }
    }

    /// Runs one scenario and returns the records it observed.
    pub async fn run(&self, scenario: Scenario) -> Result<Vec<UserInfoRecord>, SimError> {
        // Every scenario starts from an empty missed-item queue.
        self.subsystem.drain_missed().await?;
        let records = match scenario {
            Scenario::TransferUserInfo => self.transfer(TransferClass::Standard).await?,
            Scenario::TransferComplicationUserInfo => {
                self.transfer(TransferClass::Complication).await?
            }
            Scenario::SubscribeToUserInfo => self.subscribe_to_user_info().await?,
            Scenario::UserInfoQueue => self.user_info_queue().await?,
        };
        info!(scenario = scenario.name(), records = records.len(), "scenario passed");
        Ok(records)
    }

    async fn transfer(&self, class: TransferClass) -> Result<Vec<UserInfoRecord>, SimError> {
        let sent = sample_payload();
        let handle = self.subsystem.submit(sent.clone(), class).await?;
        info!(transfer = %handle.id(), %class, "waiting for acknowledgment from device");
        let received = handle.await?;
        expect_records("acknowledged payload", vec![sent], vec![received.clone()])?;
        Ok(vec![received])
    }

    async fn subscribe_to_user_info(&self) -> Result<Vec<UserInfoRecord>, SimError> {
        let waiter = self.subsystem.subscribe_once(EventName::UserInfo).await?;
        self.subsystem.send_message(request(REQUEST_USER_INFO)).await?;

        let Event::UserInfo(records) = waiter.await? else {
            return Err(SimError::UnexpectedEvent("user info"));
        };
        expect_records("subscribed user info", vec![first_canned_record()], records.clone())?;

        let missed = self.subsystem.drain_missed().await?;
        let expected_missed = match self.config.missed_item_policy {
            MissedItemPolicy::RetainWhileUnsubscribed => Vec::new(),
            MissedItemPolicy::AlwaysRetain => records.clone(),
        };
        expect_records("missed user info after live delivery", expected_missed, missed)?;
        Ok(records)
    }

    async fn user_info_queue(&self) -> Result<Vec<UserInfoRecord>, SimError> {
        let baseline = self.subsystem.stats().await?.inbound_user_info;
        self.subsystem.send_message(request(REQUEST_USER_INFO)).await?;
        self.subsystem
            .send_message(request(REQUEST_MORE_USER_INFO))
            .await?;
        self.wait_for_user_info(baseline, 2).await?;

        let queued = if self.config.flush_missed_on_subscribe {
            match self.subsystem.once(EventName::UserInfo).await? {
                Event::UserInfo(records) => records,
                _ => return Err(SimError::UnexpectedEvent("queued user info")),
            }
        } else {
            self.subsystem.drain_missed().await?
        };
        expect_records(
            "queued user info",
            vec![first_canned_record(), second_canned_record()],
            queued.clone(),
        )?;

        let again = self.subsystem.drain_missed().await?;
        expect_records("user info after dequeue", Vec::new(), again)?;
        Ok(queued)
    }

    /// Shuts the subsystem down and stops the device task.
    pub async fn shutdown(mut self) -> Result<usize, SimError> {
        let closed = self.subsystem.shutdown().await?;
        self.device_task.abort();
        if let Some(task) = self.subsystem_task.take() {
            if let Err(err) = task.await {
                warn!(error = %err, "subsystem task ended abnormally");
            }
        }
        Ok(closed)
    }
}

impl Drop for SimHarness {
    fn drop(&mut self) {
        self.device_task.abort();
    }
}

fn expect_records(
    what: &'static str,
    expected: Vec<UserInfoRecord>,
    got: Vec<UserInfoRecord>,
) -> Result<(), SimError> {
    if expected == got {
        Ok(())
    } else {
        Err(SimError::Mismatch {
            what,
            expected,
            got,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::{sample_payload, Scenario, SimHarness};
    use crate::device::DeviceBehavior;
    use tandem_node::config::SubsystemConfig;
    use tokio::time::sleep;

    #[test]
    fn scenario_names_are_distinct() {
        let mut names: Vec<_> = Scenario::ALL.iter().map(|s| s.name()).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), Scenario::ALL.len());
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_harness_stops_device() {
        let config = SubsystemConfig::default();
        let poll_interval = config.poll_interval;
        let harness = SimHarness::start(config, DeviceBehavior::default());
        let subsystem = harness.subsystem().clone();
        let peer = harness.peer().clone();
        drop(harness);

        let mut handle = subsystem
            .transfer_user_info(sample_payload())
            .await
            .expect("subsystem outlives the harness");
        sleep(poll_interval * 5).await;

        assert_eq!(peer.take_outbound().len(), 1);
        assert!(handle.try_outcome().is_none());
        assert_eq!(subsystem.shutdown().await, Ok(1));
    }
}
