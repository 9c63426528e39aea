// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! PostgreSQL Lineage Repository
//!
//! # Schema
//!
//! - `pattern_nodes`: one row per version, unique on `(pattern_id, version)`
//! - `lineage_edges`: parent → child, unique on `(source_node_id, target_node_id, edge_type)`
//! - `lineage_events`: append-only audit log
//! - `ancestry_cache`: materialized ancestor path keyed by node, with a `stale` bit
//!
//! Node writes run in one transaction: the node row, its edges, its creation
//! event and the staleness markers commit together.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgRow};
use sqlx::Row;
use std::collections::HashMap;
use uuid::Uuid;

use crate::domain::{
    AncestryCacheEntry, EventId, LineageEdge, LineageError, LineageEvent, LineageId, NodeId,
    PatternNode,
};
use crate::infrastructure::repository::{LineageRepository, NodeWrite};

const NODE_COLUMNS: &str = "id, pattern_id, name, pattern_type, version, lineage_id, generation, payload, metadata, created_at";

pub struct PostgresLineageRepository {
    pool: PgPool,
}

impl PostgresLineageRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn node_from_row(row: &PgRow) -> Result<PatternNode, LineageError> {
        let metadata: serde_json::Value = row.get("metadata");
        let metadata: HashMap<String, serde_json::Value> = serde_json::from_value(metadata)?;
        let generation: i32 = row.get("generation");

        Ok(PatternNode {
            id: NodeId(row.get("id")),
            pattern_id: row.get("pattern_id"),
            name: row.get("name"),
            pattern_type: row.get("pattern_type"),
            version: row.get("version"),
            lineage_id: LineageId(row.get("lineage_id")),
            generation: generation.max(0) as u32,
            payload: row.get("payload"),
            metadata,
            created_at: row.get("created_at"),
        })
    }

    fn edge_from_row(row: &PgRow) -> Result<LineageEdge, LineageError> {
        let edge_type: String = row.get("edge_type");
        let transformation_type: String = row.get("transformation_type");

        Ok(LineageEdge {
            source_node_id: NodeId(row.get("source_node_id")),
            target_node_id: NodeId(row.get("target_node_id")),
            edge_type: edge_type.parse()?,
            transformation_type: transformation_type.parse()?,
            weight: row.get("weight"),
            created_at: row.get("created_at"),
        })
    }

    fn event_from_row(row: &PgRow) -> Result<LineageEvent, LineageError> {
        let event_type: String = row.get("event_type");

        Ok(LineageEvent {
            id: EventId(row.get("id")),
            event_type: event_type.parse()?,
            pattern_node_id: NodeId(row.get("pattern_node_id")),
            timestamp: row.get("timestamp"),
            triggered_by: row.get("triggered_by"),
            reason: row.get("reason"),
            context: row.get("context"),
        })
    }

    fn write_error(context: &str, err: sqlx::Error) -> LineageError {
        match LineageError::from(err) {
            LineageError::StorageRead(msg) => {
                LineageError::StorageWrite(format!("{}: {}", context, msg))
            }
            other => other,
        }
    }
}

#[async_trait]
impl LineageRepository for PostgresLineageRepository {
    async fn insert_node(&self, write: NodeWrite) -> Result<(), LineageError> {
        let NodeWrite { node, edges, event } = write;
        let metadata = serde_json::to_value(&node.metadata)?;

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| Self::write_error("begin transaction", e))?;

        sqlx::query(
            r#"
            INSERT INTO pattern_nodes (
                id, pattern_id, name, pattern_type, version,
                lineage_id, generation, payload, metadata, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(node.id.0)
        .bind(&node.pattern_id)
        .bind(&node.name)
        .bind(&node.pattern_type)
        .bind(&node.version)
        .bind(node.lineage_id.0)
        .bind(node.generation as i32)
        .bind(&node.payload)
        .bind(metadata)
        .bind(node.created_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| Self::write_error("insert node", e))?;

        let mut touched: Vec<Uuid> = Vec::with_capacity(edges.len() + 1);
        for edge in &edges {
            sqlx::query(
                r#"
                INSERT INTO lineage_edges (
                    source_node_id, target_node_id, edge_type,
                    transformation_type, weight, created_at
                )
                VALUES ($1, $2, $3, $4, $5, $6)
                "#,
            )
            .bind(edge.source_node_id.0)
            .bind(edge.target_node_id.0)
            .bind(edge.edge_type.as_str())
            .bind(edge.transformation_type.as_str())
            .bind(edge.weight)
            .bind(edge.created_at)
            .execute(&mut *tx)
            .await
            .map_err(|e| Self::write_error("insert edge", e))?;

            touched.push(edge.source_node_id.0);
            touched.push(edge.target_node_id.0);
        }

        sqlx::query(
            r#"
            INSERT INTO lineage_events (
                id, event_type, pattern_node_id, timestamp, triggered_by, reason, context
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(event.id.0)
        .bind(event.event_type.as_str())
        .bind(event.pattern_node_id.0)
        .bind(event.timestamp)
        .bind(&event.triggered_by)
        .bind(&event.reason)
        .bind(&event.context)
        .execute(&mut *tx)
        .await
        .map_err(|e| Self::write_error("insert event", e))?;

        if !touched.is_empty() {
            sqlx::query("UPDATE ancestry_cache SET stale = TRUE WHERE node_id = ANY($1)")
                .bind(&touched)
                .execute(&mut *tx)
                .await
                .map_err(|e| Self::write_error("invalidate ancestry cache", e))?;
        }

        tx.commit()
            .await
            .map_err(|e| Self::write_error("commit", e))?;

        Ok(())
    }

    async fn find_node(&self, id: NodeId) -> Result<Option<PatternNode>, LineageError> {
        let row = sqlx::query(&format!("SELECT {} FROM pattern_nodes WHERE id = $1", NODE_COLUMNS))
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(Self::node_from_row).transpose()
    }

    async fn find_nodes(&self, ids: &[NodeId]) -> Result<Vec<PatternNode>, LineageError> {
        let ids: Vec<Uuid> = ids.iter().map(|id| id.0).collect();
        let rows = sqlx::query(&format!(
            "SELECT {} FROM pattern_nodes WHERE id = ANY($1)",
            NODE_COLUMNS
        ))
        .bind(&ids)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::node_from_row).collect()
    }

    async fn find_latest(&self, pattern_id: &str) -> Result<Option<PatternNode>, LineageError> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM pattern_nodes WHERE pattern_id = $1 \
             ORDER BY created_at DESC, generation DESC LIMIT 1",
            NODE_COLUMNS
        ))
        .bind(pattern_id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(Self::node_from_row).transpose()
    }

    async fn find_version(
        &self,
        pattern_id: &str,
        version: &str,
    ) -> Result<Option<PatternNode>, LineageError> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM pattern_nodes WHERE pattern_id = $1 AND version = $2",
            NODE_COLUMNS
        ))
        .bind(pattern_id)
        .bind(version)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(Self::node_from_row).transpose()
    }

    async fn find_versions(&self, pattern_id: &str) -> Result<Vec<PatternNode>, LineageError> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM pattern_nodes WHERE pattern_id = $1 ORDER BY created_at ASC",
            NODE_COLUMNS
        ))
        .bind(pattern_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::node_from_row).collect()
    }

    async fn incoming_edges(&self, node_id: NodeId) -> Result<Vec<LineageEdge>, LineageError> {
        let rows = sqlx::query(
            r#"
            SELECT source_node_id, target_node_id, edge_type, transformation_type, weight, created_at
            FROM lineage_edges
            WHERE target_node_id = $1
            ORDER BY created_at ASC
            "#,
        )
        .bind(node_id.0)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::edge_from_row).collect()
    }

    async fn outgoing_edges(&self, node_id: NodeId) -> Result<Vec<LineageEdge>, LineageError> {
        let rows = sqlx::query(
            r#"
            SELECT source_node_id, target_node_id, edge_type, transformation_type, weight, created_at
            FROM lineage_edges
            WHERE source_node_id = $1
            ORDER BY created_at ASC
            "#,
        )
        .bind(node_id.0)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::edge_from_row).collect()
    }

    async fn append_event(&self, event: &LineageEvent) -> Result<(), LineageError> {
        sqlx::query(
            r#"
            INSERT INTO lineage_events (
                id, event_type, pattern_node_id, timestamp, triggered_by, reason, context
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(event.id.0)
        .bind(event.event_type.as_str())
        .bind(event.pattern_node_id.0)
        .bind(event.timestamp)
        .bind(&event.triggered_by)
        .bind(&event.reason)
        .bind(&event.context)
        .execute(&self.pool)
        .await
        .map_err(|e| Self::write_error("append event", e))?;

        Ok(())
    }

    async fn find_events(&self, node_ids: &[NodeId]) -> Result<Vec<LineageEvent>, LineageError> {
        let ids: Vec<Uuid> = node_ids.iter().map(|id| id.0).collect();
        let rows = sqlx::query(
            r#"
            SELECT id, event_type, pattern_node_id, timestamp, triggered_by, reason, context
            FROM lineage_events
            WHERE pattern_node_id = ANY($1)
            ORDER BY timestamp ASC
            "#,
        )
        .bind(&ids)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::event_from_row).collect()
    }

    async fn load_ancestry(&self, node_id: NodeId) -> Result<Option<AncestryCacheEntry>, LineageError> {
        let row = sqlx::query(
            r#"
            SELECT node_id, ancestors, ancestry_depth, total_ancestors, lineage_id, computed_at, stale
            FROM ancestry_cache
            WHERE node_id = $1
            "#,
        )
        .bind(node_id.0)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|row| {
            let ancestors: Vec<Uuid> = row.get("ancestors");
            let depth: i32 = row.get("ancestry_depth");
            let total: i32 = row.get("total_ancestors");
            let computed_at: DateTime<Utc> = row.get("computed_at");
            AncestryCacheEntry {
                node_id: NodeId(row.get("node_id")),
                ancestors: ancestors.into_iter().map(NodeId).collect(),
                ancestry_depth: depth.max(0) as u32,
                total_ancestors: total.max(0) as usize,
                lineage_id: LineageId(row.get("lineage_id")),
                computed_at,
                stale: row.get("stale"),
            }
        }))
    }

    async fn store_ancestry(&self, entry: &AncestryCacheEntry) -> Result<(), LineageError> {
        let ancestors: Vec<Uuid> = entry.ancestors.iter().map(|id| id.0).collect();

        sqlx::query(
            r#"
            INSERT INTO ancestry_cache (
                node_id, ancestors, ancestry_depth, total_ancestors, lineage_id, computed_at, stale
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (node_id) DO UPDATE SET
                ancestors = EXCLUDED.ancestors,
                ancestry_depth = EXCLUDED.ancestry_depth,
                total_ancestors = EXCLUDED.total_ancestors,
                lineage_id = EXCLUDED.lineage_id,
                computed_at = EXCLUDED.computed_at,
                stale = EXCLUDED.stale
            "#,
        )
        .bind(entry.node_id.0)
        .bind(&ancestors)
        .bind(entry.ancestry_depth as i32)
        .bind(entry.total_ancestors as i32)
        .bind(entry.lineage_id.0)
        .bind(entry.computed_at)
        .bind(entry.stale)
        .execute(&self.pool)
        .await
        .map_err(|e| Self::write_error("store ancestry", e))?;

        Ok(())
    }
}
