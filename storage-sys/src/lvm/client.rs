// SPDX-License-Identifier: GPL-3.0-only

use std::sync::Arc;

use async_trait::async_trait;
use storage_contracts::traits::exec::render;
use storage_contracts::{CommandExecutor, CommandOutput, LvmGateway, StorageError};
use storage_types::{LogicalVolume, VolumeGroup};

use super::tools::{self, LvmCommand, NotFoundMatcher};
use crate::exec::run_checked;
use crate::{Result, SysError};

/// [`LvmGateway`] that shells out to the LVM command line tools.
#[derive(Clone)]
pub struct LvmClient {
    executor: Arc<dyn CommandExecutor>,
    not_found: NotFoundMatcher,
}

impl LvmClient {
    pub fn new(executor: Arc<dyn CommandExecutor>) -> Result<Self> {
        Ok(Self {
            executor,
            not_found: NotFoundMatcher::new()?,
        })
    }

    async fn run(&self, command: LvmCommand) -> Result<CommandOutput> {
        run_checked(self.executor.as_ref(), command.program, &command.args).await
    }

    /// Run a query, mapping the tools' "not found" failure to `None`.
    async fn query(&self, command: LvmCommand) -> Result<Option<CommandOutput>> {
        let output = self
            .executor
            .run(command.program, &command.args)
            .await
            .map_err(|source| SysError::Spawn {
                command: command.program.to_string(),
                source,
            })?;

        if output.success() {
            return Ok(Some(output));
        }

        if self.not_found.is_not_found(&output) {
            tracing::debug!(
                command = %render(command.program, &command.args),
                "LVM object not found"
            );
            return Ok(None);
        }

        Err(SysError::CommandFailed {
            command: render(command.program, &command.args),
            code: output.code,
            stderr: output.stderr.trim().to_string(),
        })
    }
}

#[async_trait]
impl LvmGateway for LvmClient {
    async fn create_lv(
        &self,
        vg_name: &str,
        lv_name: &str,
        size: u64,
        tags: &[String],
    ) -> std::result::Result<(), StorageError> {
        self.run(tools::lvcreate(vg_name, lv_name, size, tags))
            .await?;
        tracing::info!(group = %vg_name, name = %lv_name, size, "Created logical volume");
        Ok(())
    }

    async fn get_lv(
        &self,
        vg_name: &str,
        lv_name: &str,
    ) -> std::result::Result<Option<LogicalVolume>, StorageError> {
        let Some(output) = self.query(tools::lvs(vg_name, lv_name)).await? else {
            return Ok(None);
        };

        Ok(tools::parse_lvs(vg_name, &output.stdout)?)
    }

    async fn delete_lv(&self, vg_name: &str, lv_name: &str) -> std::result::Result<(), StorageError> {
        if self.query(tools::lvremove(vg_name, lv_name)).await?.is_some() {
            tracing::info!(group = %vg_name, name = %lv_name, "Removed logical volume");
        }
        Ok(())
    }

    async fn resize_lv(
        &self,
        vg_name: &str,
        lv_name: &str,
        size: u64,
    ) -> std::result::Result<(), StorageError> {
        self.run(tools::lvextend(vg_name, lv_name, size)).await?;
        tracing::info!(group = %vg_name, name = %lv_name, size, "Extended logical volume");
        Ok(())
    }

    async fn activate_lv(
        &self,
        vg_name: &str,
        lv_name: &str,
    ) -> std::result::Result<(), StorageError> {
        self.run(tools::lvchange_activate(vg_name, lv_name)).await?;
        Ok(())
    }

    async fn deactivate_lv(
        &self,
        vg_name: &str,
        lv_name: &str,
    ) -> std::result::Result<(), StorageError> {
        self.run(tools::lvchange_deactivate(vg_name, lv_name))
            .await?;
        Ok(())
    }

    async fn get_vg(&self, vg_name: &str) -> std::result::Result<Option<VolumeGroup>, StorageError> {
        let Some(output) = self.query(tools::vgs(vg_name)).await? else {
            return Ok(None);
        };

        Ok(tools::parse_vgs(&output.stdout)?)
    }
}

#[cfg(test)]
mod tests {
    use storage_contracts::StorageErrorKind;

    use super::*;
    use crate::exec::testing::FakeExecutor;

    fn client(executor: &FakeExecutor) -> LvmClient {
        LvmClient::new(Arc::new(executor.clone())).expect("client")
    }

    #[tokio::test]
    async fn create_issues_lvcreate_with_tags() {
        let executor = FakeExecutor::default();
        let lvm = client(&executor);

        lvm.create_lv("test-vg", "test-lv", 1024 * 1024 * 1024, &["test-tag".to_string()])
            .await
            .expect("create");

        assert_eq!(
            executor.take_calls(),
            vec![
                "lvcreate --name test-lv --wipesignatures y --yes --size 1073741824b \
                 --setautoactivation n --addtag test-tag test-vg"
                    .to_string()
            ]
        );
    }

    #[tokio::test]
    async fn create_failure_is_internal_with_stderr() {
        let executor = FakeExecutor::default();
        executor.reply(5, "", "  Insufficient free space\n");
        let lvm = client(&executor);

        let err = lvm
            .create_lv("test-vg", "test-lv", 1024, &[])
            .await
            .unwrap_err();
        assert_eq!(err.kind, StorageErrorKind::Internal);
        assert!(err.message.contains("Insufficient free space"));
    }

    #[tokio::test]
    async fn get_lv_parses_row() {
        let executor = FakeExecutor::default();
        executor.reply(0, "  lv1 1073741824B -wi-a----- t1,t2\n", "");
        let lvm = client(&executor);

        let lv = lvm
            .get_lv("vg1", "lv1")
            .await
            .expect("query")
            .expect("present");
        assert_eq!(lv.size, 1073741824);
        assert!(lv.is_active());
        assert_eq!(lv.tags, vec!["t1".to_string(), "t2".to_string()]);
        assert_eq!(
            executor.take_calls(),
            vec![
                "lvs --noheadings --nosuffix --units b -o lv_name,lv_size,lv_attr,lv_tags vg1/lv1"
                    .to_string()
            ]
        );
    }

    #[tokio::test]
    async fn get_lv_missing_volume_is_none() {
        let executor = FakeExecutor::default();
        executor.reply(5, "", r#"  Failed to find logical volume "vg1/lv1""#);
        executor.reply(5, "", r#"  Volume group "vg1" not found"#);
        executor.reply(0, "", "");
        let lvm = client(&executor);

        for _ in 0..3 {
            assert_eq!(lvm.get_lv("vg1", "lv1").await.expect("query"), None);
        }
    }

    #[tokio::test]
    async fn get_lv_other_failures_are_errors() {
        let executor = FakeExecutor::default();
        executor.reply(3, "", r#"  Failed to find logical volume "vg1/lv1""#);
        executor.reply(5, "", "  Device busy");
        executor.reply_spawn_error();
        let lvm = client(&executor);

        for _ in 0..3 {
            let err = lvm.get_lv("vg1", "lv1").await.unwrap_err();
            assert_eq!(err.kind, StorageErrorKind::Internal);
        }
    }

    #[tokio::test]
    async fn get_lv_malformed_row_is_internal() {
        let executor = FakeExecutor::default();
        executor.reply(0, "  lv1 1073741824B\n", "");
        let lvm = client(&executor);

        let err = lvm.get_lv("vg1", "lv1").await.unwrap_err();
        assert_eq!(err.kind, StorageErrorKind::Internal);
    }

    #[tokio::test]
    async fn delete_of_missing_volume_succeeds() {
        let executor = FakeExecutor::default();
        executor.reply(5, "", r#"  Failed to find logical volume "vg1/lv1""#);
        let lvm = client(&executor);

        lvm.delete_lv("vg1", "lv1").await.expect("delete");
        assert_eq!(executor.take_calls(), vec!["lvremove -f vg1/lv1".to_string()]);
    }

    #[tokio::test]
    async fn mutations_use_group_qualified_names() {
        let executor = FakeExecutor::default();
        let lvm = client(&executor);

        lvm.resize_lv("vg1", "lv1", 2048).await.expect("resize");
        lvm.activate_lv("vg1", "lv1").await.expect("activate");
        lvm.deactivate_lv("vg1", "lv1").await.expect("deactivate");

        assert_eq!(
            executor.take_calls(),
            vec![
                "lvextend -L 2048b vg1/lv1".to_string(),
                "lvchange -ay vg1/lv1".to_string(),
                "lvchange -an vg1/lv1".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn get_vg_reports_free_space_or_absence() {
        let executor = FakeExecutor::default();
        executor.reply(0, "  vg1 10737418240B\n", "");
        executor.reply(5, "", r#"  Volume group "vg2" not found"#);
        let lvm = client(&executor);

        let vg = lvm.get_vg("vg1").await.expect("query").expect("present");
        assert_eq!(vg.free, 10737418240);
        assert_eq!(lvm.get_vg("vg2").await.expect("query"), None);
    }
}
