//! 数据库存储模块
//!
//! 使用SQLite记录每次成功的决策（输入、结果、解释和规则集摘要），供事后审计。

use crate::core::models::Decision;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use uuid::Uuid;

/// 审计记录
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionRecord {
    pub id: String,
    pub recorded_at: DateTime<Utc>,
    pub function_block: String,
    pub ruleset_digest: String,
    pub inputs: BTreeMap<String, serde_json::Value>,
    pub decision: Decision,
}

impl DecisionRecord {
    /// 为一次决策生成新记录
    pub fn new(
        function_block: impl Into<String>,
        ruleset_digest: impl Into<String>,
        inputs: BTreeMap<String, serde_json::Value>,
        decision: Decision,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            recorded_at: Utc::now(),
            function_block: function_block.into(),
            ruleset_digest: ruleset_digest.into(),
            inputs,
            decision,
        }
    }
}

/// 数据库管理器
pub struct Database {
    conn: Connection,
}

impl Database {
    /// 打开或创建数据库
    pub fn open(path: &Path) -> Result<Self> {
        // 确保目录存在
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)
            .with_context(|| format!("无法打开审计数据库: {}", path.display()))?;
        let db = Self { conn };
        db.init_tables()?;
        Ok(db)
    }

    /// 内存数据库
    pub fn open_in_memory() -> Result<Self> {
        let db = Self {
            conn: Connection::open_in_memory()?,
        };
        db.init_tables()?;
        Ok(db)
    }

    /// 初始化表结构
    fn init_tables(&self) -> Result<()> {
        self.conn.execute_batch(
            r#"
            -- 决策记录表
            CREATE TABLE IF NOT EXISTS decisions (
                id TEXT PRIMARY KEY,
                recorded_at TEXT NOT NULL,
                function_block TEXT NOT NULL,
                ruleset_digest TEXT NOT NULL,
                inputs_json TEXT NOT NULL,
                decision_json TEXT NOT NULL
            );

            -- 创建索引
            CREATE INDEX IF NOT EXISTS idx_decisions_recorded ON decisions(recorded_at DESC);
            CREATE INDEX IF NOT EXISTS idx_decisions_digest ON decisions(ruleset_digest);
            "#,
        )?;
        Ok(())
    }

    /// 保存决策记录
    pub fn record(&self, record: &DecisionRecord) -> Result<()> {
        let inputs_json = serde_json::to_string(&record.inputs)?;
        let decision_json = serde_json::to_string(&record.decision)?;

        self.conn.execute(
            r#"
            INSERT INTO decisions
            (id, recorded_at, function_block, ruleset_digest, inputs_json, decision_json)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![
                record.id,
                record.recorded_at.to_rfc3339(),
                record.function_block,
                record.ruleset_digest,
                inputs_json,
                decision_json,
            ],
        )?;
        Ok(())
    }

    /// 加载最近的决策记录（新记录在前）
    pub fn load_recent(&self, limit: usize) -> Result<Vec<DecisionRecord>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT id, recorded_at, function_block, ruleset_digest, inputs_json, decision_json
            FROM decisions
            ORDER BY recorded_at DESC, rowid DESC
            LIMIT ?1
            "#,
        )?;

        let rows = stmt.query_map(params![limit as i64], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, String>(4)?,
                row.get::<_, String>(5)?,
            ))
        })?;

        let mut records = Vec::new();
        for row in rows {
            let (id, recorded_at, function_block, ruleset_digest, inputs_json, decision_json) = row?;
            records.push(DecisionRecord {
                recorded_at: DateTime::parse_from_rfc3339(&recorded_at)
                    .with_context(|| format!("记录 {} 的时间戳无效", id))?
                    .with_timezone(&Utc),
                inputs: serde_json::from_str(&inputs_json)
                    .with_context(|| format!("记录 {} 的输入无法解析", id))?,
                decision: serde_json::from_str(&decision_json)
                    .with_context(|| format!("记录 {} 的决策无法解析", id))?,
                id,
                function_block,
                ruleset_digest,
            });
        }
        Ok(records)
    }

    /// 记录总数
    pub fn count(&self) -> Result<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM decisions", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    /// 清理旧的决策记录，只保留最近 keep_count 条
    pub fn cleanup_old_records(&self, keep_count: usize) -> Result<usize> {
        let affected = self.conn.execute(
            r#"
            DELETE FROM decisions
            WHERE id NOT IN (
                SELECT id FROM decisions
                ORDER BY recorded_at DESC, rowid DESC
                LIMIT ?1
            )
            "#,
            params![keep_count as i64],
        )?;
        Ok(affected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::{Explanation, OutputDecision};
    use chrono::Duration;
    use tempfile::tempdir;

    fn sample_decision(term: &str, value: f64) -> Decision {
        let mut outputs = BTreeMap::new();
        outputs.insert(
            "suggestedWorkSharingApproach".to_string(),
            OutputDecision {
                dominant_term: term.to_string(),
                crisp_value: value,
            },
        );
        Decision {
            outputs,
            explanation: Explanation::default(),
        }
    }

    fn sample_record(term: &str, offset_secs: i64) -> DecisionRecord {
        let mut inputs = BTreeMap::new();
        inputs.insert("noOfTrucksInQueue".to_string(), serde_json::json!(7));
        let mut record = DecisionRecord::new("slidingDecision", "abc123", inputs, sample_decision(term, 34.25));
        record.recorded_at = record.recorded_at + Duration::seconds(offset_secs);
        record
    }

    #[test]
    fn test_database_init() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("audit").join("test.db");

        let db = Database::open(&db_path).unwrap();
        assert!(db_path.exists());
        assert_eq!(db.count().unwrap(), 0);
    }

    #[test]
    fn test_record_and_load() {
        let db = Database::open_in_memory().unwrap();
        let record = sample_record("HUMAN_ON_THE_LOOP", 0);
        db.record(&record).unwrap();

        let loaded = db.load_recent(10).unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].id, record.id);
        assert_eq!(loaded[0].ruleset_digest, "abc123");
        assert_eq!(loaded[0].inputs, record.inputs);
        assert_eq!(loaded[0].decision, record.decision);
    }

    #[test]
    fn test_recent_first_and_cleanup() {
        let db = Database::open_in_memory().unwrap();
        db.record(&sample_record("AI_AUTONOMOUSLY", 0)).unwrap();
        db.record(&sample_record("HUMAN_IN_THE_LOOP", 10)).unwrap();
        db.record(&sample_record("HUMAN_MANUALLY", 20)).unwrap();

        let recent = db.load_recent(2).unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(
            recent[0].decision.dominant_term("suggestedWorkSharingApproach"),
            Some("HUMAN_MANUALLY")
        );

        assert_eq!(db.cleanup_old_records(1).unwrap(), 2);
        assert_eq!(db.count().unwrap(), 1);
    }
}
