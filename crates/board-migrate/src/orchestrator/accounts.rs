//! Member and site-config passes.

use rand::RngCore;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::core::row::{RowBuilder, UpdateSpec};
use crate::core::traits::{InsertOutcome, TargetStore};
use crate::error::{MigrateError, Result};
use crate::source::LegacyMember;
use crate::transfer::content::{legacy_datetime, now_datetime};
use crate::transfer::{insert_if_absent_with, RunContext, UpsertOutcome};

use super::Orchestrator;

/// Bytes of random material behind each new member password.
const PASSWORD_SECRET_BYTES: usize = 8;

#[cfg(not(test))]
const PASSWORD_HASH_COST: u32 = bcrypt::DEFAULT_COST;
#[cfg(test)]
const PASSWORD_HASH_COST: u32 = 4;

/// What the site pass did to the config singleton.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SiteConfigAction {
    Updated,
    Inserted,
}

/// bcrypt hash of fresh random material nobody knows.
pub fn unusable_password_hash() -> Result<String> {
    let mut secret = [0u8; PASSWORD_SECRET_BYTES];
    rand::thread_rng().fill_bytes(&mut secret);
    Ok(bcrypt::hash(hex::encode(secret), PASSWORD_HASH_COST)?)
}

/// Memo text recording where a member came from.
pub fn member_provenance(member: &LegacyMember) -> String {
    format!(
        "migrated_from_legacy member_srl={} original_pass_hash={}",
        member
            .member_srl
            .map(|srl| srl.to_string())
            .unwrap_or_default(),
        member.password.as_deref().unwrap_or_default()
    )
}

impl Orchestrator {
    /// Page through source members. Returns false if cancelled.
    pub(crate) async fn migrate_members(
        &self,
        ctx: &mut RunContext,
        target: &dyn TargetStore,
        prefix: &str,
        cancel: &CancellationToken,
    ) -> Result<bool> {
        let page_size = self.config.migration.effective_batch_size();
        let member_table = self.target_table("member");
        let mut offset = 0;

        info!("Migrating members from {}member", prefix);
        loop {
            let page = self.source.load_members(prefix, offset, page_size).await?;
            if page.is_empty() {
                break;
            }
            offset += page.len();

            for member in &page {
                if cancel.is_cancelled() {
                    info!("Cancelled during member pass");
                    return Ok(false);
                }
                self.migrate_member(ctx, target, &member_table, member)
                    .await?;
            }

            if page.len() < page_size {
                break;
            }
        }

        if offset == 0 {
            info!("No members found in {}member", prefix);
        } else {
            info!(
                "Members: {} read, {} created, {} existing",
                offset, ctx.stats.members_created, ctx.stats.members_existing
            );
        }
        Ok(true)
    }

    async fn migrate_member(
        &self,
        ctx: &mut RunContext,
        target: &dyn TargetStore,
        member_table: &str,
        member: &LegacyMember,
    ) -> Result<()> {
        let Some(user_id) = member.user_id.as_deref().filter(|id| !id.is_empty()) else {
            warn!(
                "Skipping member_srl={} without a user_id",
                member
                    .member_srl
                    .map(|srl| srl.to_string())
                    .unwrap_or_else(|| "(unknown)".to_string())
            );
            ctx.stats.members_invalid += 1;
            return Ok(());
        };

        let outcome = insert_if_absent_with(
            ctx,
            target,
            member_table,
            "mb_id",
            user_id.into(),
            || {
                let registered = member
                    .regdate
                    .as_deref()
                    .filter(|d| !d.is_empty())
                    .map(legacy_datetime)
                    .unwrap_or_else(now_datetime);
                let mut builder = RowBuilder::new(member_table)
                    .value("mb_password", unusable_password_hash()?)
                    .value("mb_name", member.user_name.clone().unwrap_or_default())
                    .value("mb_nick", member.nick_name.clone().unwrap_or_default())
                    .value("mb_email", member.email_address.clone().unwrap_or_default())
                    .value("mb_homepage", member.homepage.clone().unwrap_or_default())
                    .value("mb_datetime", registered)
                    .value("mb_memo", member_provenance(member));
                if let Some(last_login) = member.last_login.as_deref().filter(|d| !d.is_empty()) {
                    builder = builder.value("mb_today_login", legacy_datetime(last_login));
                }
                Ok(builder)
            },
        )
        .await?;

        match outcome {
            UpsertOutcome::Created { .. } => {
                ctx.stats.members_created += 1;
                info!("+ member {} created", user_id);
            }
            UpsertOutcome::Existing => {
                ctx.stats.members_existing += 1;
                info!("- member {} exists, skipped", user_id);
            }
        }
        Ok(())
    }

    /// Copy the site title into the config singleton.
    pub(crate) async fn migrate_site(
        &self,
        ctx: &mut RunContext,
        target: &dyn TargetStore,
        prefix: &str,
    ) -> Result<Option<(String, SiteConfigAction)>> {
        let Some(site) = self.source.load_site(prefix).await? else {
            info!("No site row in {}sites, config left unchanged", prefix);
            return Ok(None);
        };
        let title = site.site_title();
        let config_table = self.target_table("config");

        if target.has_rows(&config_table).await? {
            target
                .update(&UpdateSpec::first_row(
                    &config_table,
                    vec![("cf_title".to_string(), title.as_str().into())],
                ))
                .await?;
            info!("+ site title updated: {}", title);
            return Ok(Some((title, SiteConfigAction::Updated)));
        }

        let required = ctx.required_columns(target, &config_table).await?;
        let spec = RowBuilder::new(&config_table)
            .value("cf_title", title.as_str())
            .build(&required);
        match target.insert(&spec).await? {
            InsertOutcome::Inserted { .. } => {
                info!("+ site title inserted: {}", title);
                Ok(Some((title, SiteConfigAction::Inserted)))
            }
            InsertOutcome::PayloadTooLarge { .. } => Err(MigrateError::PayloadTooLarge {
                table: config_table,
                column: "cf_title".to_string(),
                length: title.chars().count(),
                max_length: 0,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::member;

    #[test]
    fn test_provenance_memo() {
        let m = member(12, "alice");
        assert_eq!(
            member_provenance(&m),
            "migrated_from_legacy member_srl=12 original_pass_hash=legacy-hash-12"
        );

        let empty = LegacyMember::default();
        assert_eq!(
            member_provenance(&empty),
            "migrated_from_legacy member_srl= original_pass_hash="
        );
    }

    #[test]
    fn test_unusable_password_hash_is_fresh_bcrypt() {
        let a = unusable_password_hash().unwrap();
        let b = unusable_password_hash().unwrap();
        assert!(a.starts_with("$2"));
        assert_ne!(a, b);
    }

    #[test]
    fn test_site_action_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&SiteConfigAction::Updated).unwrap(),
            "\"updated\""
        );
    }
}
