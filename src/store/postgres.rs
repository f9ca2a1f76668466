use async_trait::async_trait;
use sqlx::{PgConnection, PgPool, Postgres, Transaction};
use tracing::debug;
use uuid::Uuid;

use super::{canonical_address, QuestStore, StoreTx};
use crate::db::models::{
    BalanceStats, Network, NewClaimRecord, QuestDefinition, QuestStatus, RankedBalance, User,
    UserQuest,
};
use crate::error::{QuestError, Result};

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn to_db_block(block: u64) -> Result<i64> {
    i64::try_from(block).map_err(|_| QuestError::Internal(format!("block {} out of range", block)))
}

#[async_trait]
impl QuestStore for PgStore {
    async fn load_cursor(&self, network: Network) -> Result<Option<u64>> {
        let block: Option<i64> = sqlx::query_scalar(
            r#"
            SELECT last_processed_block
            FROM blockchain_parser_state
            WHERE network = $1
            "#,
        )
        .bind(network)
        .fetch_optional(&self.pool)
        .await?;

        block
            .map(|b| {
                u64::try_from(b)
                    .map_err(|_| QuestError::Internal(format!("negative cursor {} for {}", b, network)))
            })
            .transpose()
    }

    async fn upsert_cursor(&self, network: Network, block: u64) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO blockchain_parser_state (network, last_processed_block)
            VALUES ($1, $2)
            ON CONFLICT (network)
            DO UPDATE SET
                last_processed_block = GREATEST(
                    blockchain_parser_state.last_processed_block,
                    EXCLUDED.last_processed_block
                ),
                updated_at = NOW()
            "#,
        )
        .bind(network)
        .bind(to_db_block(block)?)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn active_quests(&self) -> Result<Vec<QuestDefinition>> {
        let quests = sqlx::query_as::<_, QuestDefinition>(
            r#"
            SELECT id, quest_type, contract_address, from_address, to_address, amount, created_at
            FROM quests
            WHERE deleted_at IS NULL
            ORDER BY created_at ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(quests)
    }

    async fn begin(&self) -> Result<Box<dyn StoreTx>> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgStoreTx { tx: Some(tx) }))
    }

    async fn ranked_balances(&self, limit: usize) -> Result<Vec<RankedBalance>> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let rows = sqlx::query_as::<_, RankedBalance>(
            r#"
            SELECT u.id AS user_id, u.wallet_address, COALESCE(b.balance, '0') AS balance
            FROM users u
            LEFT JOIN user_balances b ON b.user_id = u.id AND b.deleted_at IS NULL
            WHERE u.deleted_at IS NULL
            ORDER BY COALESCE(b.balance, '0')::numeric DESC, u.id ASC
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    async fn balance_stats(&self) -> Result<BalanceStats> {
        let (total_users, total_balance, average_balance): (i64, String, String) = sqlx::query_as(
            r#"
            SELECT
                COUNT(u.id) AS total_users,
                COALESCE(SUM(COALESCE(b.balance, '0')::numeric), 0)::text AS total_balance,
                COALESCE(
                    TRUNC(SUM(COALESCE(b.balance, '0')::numeric) / NULLIF(COUNT(u.id), 0)),
                    0
                )::text AS average_balance
            FROM users u
            LEFT JOIN user_balances b ON b.user_id = u.id AND b.deleted_at IS NULL
            WHERE u.deleted_at IS NULL
            "#,
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(BalanceStats {
            total_users,
            total_balance,
            average_balance,
        })
    }
}

pub struct PgStoreTx {
    tx: Option<Transaction<'static, Postgres>>,
}

impl PgStoreTx {
    fn conn(&mut self) -> Result<&mut PgConnection> {
        self.tx
            .as_deref_mut()
            .ok_or_else(|| QuestError::Internal("transaction already finished".to_string()))
    }
}

#[async_trait]
impl StoreTx for PgStoreTx {
    async fn find_user_by_wallet(&mut self, wallet: &str) -> Result<Option<User>> {
        let wallet = canonical_address(wallet);
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, wallet_address
            FROM users
            WHERE LOWER(wallet_address) = $1 AND deleted_at IS NULL
            "#,
        )
        .bind(&wallet)
        .fetch_optional(self.conn()?)
        .await?;

        Ok(user)
    }

    async fn find_user_quest(
        &mut self,
        user_id: Uuid,
        quest_id: Uuid,
        status: QuestStatus,
    ) -> Result<Option<UserQuest>> {
        let row = sqlx::query_as::<_, UserQuest>(
            r#"
            SELECT id, user_id, quest_id, status
            FROM user_quests
            WHERE user_id = $1 AND quest_id = $2 AND status = $3
            "#,
        )
        .bind(user_id)
        .bind(quest_id)
        .bind(status)
        .fetch_optional(self.conn()?)
        .await?;

        Ok(row)
    }

    async fn update_quest_status(
        &mut self,
        quest_id: Uuid,
        user_id: Uuid,
        from: QuestStatus,
        to: QuestStatus,
    ) -> Result<u64> {
        let result = sqlx::query(
            r#"
            UPDATE user_quests
            SET status = $1, updated_at = NOW()
            WHERE quest_id = $2 AND user_id = $3 AND status = $4
            "#,
        )
        .bind(to)
        .bind(quest_id)
        .bind(user_id)
        .bind(from)
        .execute(self.conn()?)
        .await?;

        Ok(result.rows_affected())
    }

    async fn insert_claim(&mut self, record: &NewClaimRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO user_claims (
                user_id,
                quest_id,
                claim_amount,
                claim_token_address,
                claim_timestamp,
                claim_transaction_hash
            )
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(record.user_id)
        .bind(record.quest_id)
        .bind(&record.amount)
        .bind(&record.token)
        .bind(record.timestamp)
        .bind(&record.tx_hash)
        .execute(self.conn()?)
        .await?;

        Ok(())
    }

    async fn balance(&mut self, user_id: Uuid) -> Result<Option<String>> {
        let balance: Option<String> = sqlx::query_scalar(
            r#"
            SELECT balance
            FROM user_balances
            WHERE user_id = $1 AND deleted_at IS NULL
            "#,
        )
        .bind(user_id)
        .fetch_optional(self.conn()?)
        .await?;

        Ok(balance)
    }

    async fn insert_balance(&mut self, user_id: Uuid, balance: &str) -> Result<u64> {
        let result = sqlx::query(
            r#"
            INSERT INTO user_balances (user_id, balance)
            VALUES ($1, $2)
            ON CONFLICT (user_id) DO NOTHING
            "#,
        )
        .bind(user_id)
        .bind(balance)
        .execute(self.conn()?)
        .await?;

        Ok(result.rows_affected())
    }

    async fn update_balance(&mut self, user_id: Uuid, expected: &str, new: &str) -> Result<u64> {
        let result = sqlx::query(
            r#"
            UPDATE user_balances
            SET balance = $1, updated_at = NOW()
            WHERE user_id = $2 AND balance = $3 AND deleted_at IS NULL
            "#,
        )
        .bind(new)
        .bind(user_id)
        .bind(expected)
        .execute(self.conn()?)
        .await?;

        Ok(result.rows_affected())
    }

    async fn commit(&mut self) -> Result<()> {
        let tx = self
            .tx
            .take()
            .ok_or_else(|| QuestError::Internal("transaction already finished".to_string()))?;
        tx.commit().await?;
        debug!("Transaction committed");
        Ok(())
    }
}
