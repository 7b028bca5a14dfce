//! `cumulus destroy`: the same playbook, every resource forced absent

use super::apply::{self, WaitArgs};
use crate::playbook::Playbook;
use cumulus_cloud::{DesiredState, Reconciler};

pub async fn handle(
    reconciler: &Reconciler,
    playbook: &Playbook,
    wait: WaitArgs,
) -> anyhow::Result<()> {
    apply::run(reconciler, playbook, Some(DesiredState::Absent), wait).await
}
