//! The datastore contract: a transactional key-value store with a 4D
//! spatial index, treated as a black box by everything above it. The
//! Postgres implementation here backs it with `deadpool_postgres`, but
//! nothing outside this file knows that.

use crate::error::{Result, SubstrateError};
use crate::substrate::{
    Composition, CompositionSequence, Physicality, Relation, RelationEvidence, RelationRating,
    RelationSequence,
};
use deadpool_postgres::{Config as PoolConfig, Pool, Runtime};
use nalgebra::Vector4;
use tokio_postgres::NoTls;

/// The composition on the other end of a relation incident to some
/// `comp_id`, with the rating fields a walk or search needs to score it
/// without a second round trip.
#[derive(Debug, Clone, Copy)]
pub struct RelationNeighbor {
    pub comp_id: u128,
    pub centroid: Vector4<f64>,
    pub elo: f64,
    pub observations: u32,
}

/// Everything the flusher and the search components need from storage,
/// kept narrow enough that an alternate backend (e.g. an embedded store for
/// tests) only has to implement these operations.
#[async_trait::async_trait]
pub trait Datastore: Send + Sync {
    /// Begin a transaction scoped to one batch flush; the returned guard's
    /// `commit`/`rollback` finalize it.
    async fn begin(&self) -> Result<Box<dyn Transaction>>;

    /// Radius query around `center` on S³, within `radius` geodesic
    /// distance, via the backing 4D spatial index.
    async fn query_radius(
        &self,
        center: &nalgebra::Vector4<f64>,
        radius: f64,
        limit: usize,
    ) -> Result<Vec<Physicality>>;

    /// k nearest physicalities to `center` by geodesic distance.
    async fn query_knn(&self, center: &nalgebra::Vector4<f64>, k: usize) -> Result<Vec<Physicality>>;

    async fn fetch_physicality(&self, phys_id: u128) -> Result<Option<Physicality>>;

    /// For every relation incident to `comp_id`, the *sibling* composition
    /// on the other end (not the relation itself), ranked by descending
    /// elo and capped at `limit`, via the self-join on `relation_sequence`.
    async fn fetch_relation_neighbors(
        &self,
        comp_id: u128,
        limit: usize,
    ) -> Result<Vec<RelationNeighbor>>;

    async fn fetch_composition(&self, comp_id: u128) -> Result<Option<Composition>>;
}

/// One batch-flush transaction: the async flusher writes a whole
/// `SubstrateBatch` through a single instance of this before commit.
#[async_trait::async_trait]
pub trait Transaction: Send {
    async fn upsert_physicality(&mut self, phys: &Physicality) -> Result<()>;
    async fn upsert_composition(&mut self, comp: &Composition) -> Result<()>;
    async fn upsert_composition_sequence(&mut self, seq: &[CompositionSequence]) -> Result<()>;
    async fn upsert_relation(&mut self, rel: &Relation) -> Result<()>;
    async fn upsert_relation_sequence(&mut self, seq: &[RelationSequence]) -> Result<()>;
    async fn upsert_relation_rating(&mut self, rating: &RelationRating) -> Result<()>;
    async fn upsert_relation_evidence(&mut self, evidence: &RelationEvidence) -> Result<()>;
    async fn commit(self: Box<Self>) -> Result<()>;
    async fn rollback(self: Box<Self>) -> Result<()>;
}

/// Postgres-backed [`Datastore`], pooled via `deadpool_postgres`.
pub struct PostgresDatastore {
    pool: Pool,
}

impl PostgresDatastore {
    pub async fn connect(database_url: &str, pool_size: u32) -> Result<Self> {
        let mut cfg = PoolConfig::new();
        cfg.url = Some(database_url.to_string());
        cfg.pool = Some(deadpool_postgres::PoolConfig::new(pool_size as usize));

        let pool = cfg
            .create_pool(Some(Runtime::Tokio1), NoTls)
            .map_err(|e| SubstrateError::Database(format!("failed to create pool: {e}")))?;

        Ok(Self { pool })
    }

    /// Idempotent schema bootstrap; safe to call on every process start.
    pub async fn initialize_schema(&self) -> Result<()> {
        let client = self.pool.get().await?;

        client
            .batch_execute(
                r#"
                CREATE TABLE IF NOT EXISTS physicality (
                    phys_id NUMERIC(39,0) PRIMARY KEY,
                    hilbert_index NUMERIC(39,0) NOT NULL,
                    centroid DOUBLE PRECISION[4] NOT NULL,
                    trajectory DOUBLE PRECISION[][] NOT NULL
                );
                CREATE INDEX IF NOT EXISTS idx_physicality_hilbert ON physicality (hilbert_index);

                CREATE TABLE IF NOT EXISTS composition (
                    comp_id NUMERIC(39,0) PRIMARY KEY,
                    phys_id NUMERIC(39,0) NOT NULL REFERENCES physicality(phys_id)
                );

                CREATE TABLE IF NOT EXISTS composition_sequence (
                    seq_id NUMERIC(39,0) PRIMARY KEY,
                    comp_id NUMERIC(39,0) NOT NULL REFERENCES composition(comp_id),
                    atom_id NUMERIC(39,0) NOT NULL,
                    ordinal INTEGER NOT NULL,
                    occurrences INTEGER NOT NULL
                );

                CREATE TABLE IF NOT EXISTS relation (
                    rel_id NUMERIC(39,0) PRIMARY KEY,
                    phys_id NUMERIC(39,0) NOT NULL REFERENCES physicality(phys_id)
                );

                CREATE TABLE IF NOT EXISTS relation_sequence (
                    seq_id NUMERIC(39,0) PRIMARY KEY,
                    rel_id NUMERIC(39,0) NOT NULL REFERENCES relation(rel_id),
                    comp_id NUMERIC(39,0) NOT NULL,
                    role INTEGER NOT NULL
                );
                CREATE INDEX IF NOT EXISTS idx_relation_sequence_comp ON relation_sequence (comp_id);

                CREATE TABLE IF NOT EXISTS relation_rating (
                    rel_id NUMERIC(39,0) PRIMARY KEY REFERENCES relation(rel_id),
                    observations INTEGER NOT NULL,
                    elo DOUBLE PRECISION NOT NULL,
                    k_factor DOUBLE PRECISION NOT NULL
                );

                CREATE TABLE IF NOT EXISTS relation_evidence (
                    evidence_id NUMERIC(39,0) PRIMARY KEY,
                    content_id NUMERIC(39,0) NOT NULL,
                    rel_id NUMERIC(39,0) NOT NULL REFERENCES relation(rel_id),
                    positive BOOLEAN NOT NULL,
                    base_rating DOUBLE PRECISION NOT NULL,
                    weight DOUBLE PRECISION NOT NULL,
                    UNIQUE (content_id, rel_id)
                );
                "#,
            )
            .await
            .map_err(SubstrateError::from)?;

        Ok(())
    }
}

#[async_trait::async_trait]
impl Datastore for PostgresDatastore {
    async fn begin(&self) -> Result<Box<dyn Transaction>> {
        let client = self.pool.get().await?;
        Ok(Box::new(PostgresTransaction::new(client).await?))
    }

    async fn query_radius(
        &self,
        center: &nalgebra::Vector4<f64>,
        radius: f64,
        limit: usize,
    ) -> Result<Vec<Physicality>> {
        let client = self.pool.get().await?;
        let rows = client
            .query(
                r#"
                SELECT phys_id, hilbert_index, centroid, trajectory
                FROM physicality
                WHERE acos(LEAST(1.0, GREATEST(-1.0,
                    centroid[1]*$1 + centroid[2]*$2 + centroid[3]*$3 + centroid[4]*$4
                ))) <= $5
                LIMIT $6
                "#,
                &[
                    &center[0],
                    &center[1],
                    &center[2],
                    &center[3],
                    &radius,
                    &(limit as i64),
                ],
            )
            .await?;
        rows.iter().map(row_to_physicality).collect()
    }

    async fn query_knn(&self, center: &nalgebra::Vector4<f64>, k: usize) -> Result<Vec<Physicality>> {
        let client = self.pool.get().await?;
        let rows = client
            .query(
                r#"
                SELECT phys_id, hilbert_index, centroid, trajectory
                FROM physicality
                ORDER BY acos(LEAST(1.0, GREATEST(-1.0,
                    centroid[1]*$1 + centroid[2]*$2 + centroid[3]*$3 + centroid[4]*$4
                ))) ASC
                LIMIT $5
                "#,
                &[&center[0], &center[1], &center[2], &center[3], &(k as i64)],
            )
            .await?;
        rows.iter().map(row_to_physicality).collect()
    }

    async fn fetch_physicality(&self, phys_id: u128) -> Result<Option<Physicality>> {
        let client = self.pool.get().await?;
        let row = client
            .query_opt(
                "SELECT phys_id, hilbert_index, centroid, trajectory FROM physicality WHERE phys_id = $1",
                &[&u128_to_numeric_str(phys_id)],
            )
            .await?;
        row.map(|r| row_to_physicality(&r)).transpose()
    }

    async fn fetch_relation_neighbors(
        &self,
        comp_id: u128,
        limit: usize,
    ) -> Result<Vec<RelationNeighbor>> {
        let client = self.pool.get().await?;
        let rows = client
            .query(
                r#"
                SELECT other.comp_id AS neighbor_comp_id, p.centroid, rr.elo, rr.observations
                FROM relation_sequence rs
                JOIN relation_sequence other ON other.rel_id = rs.rel_id AND other.comp_id <> rs.comp_id
                JOIN composition c ON c.comp_id = other.comp_id
                JOIN physicality p ON p.phys_id = c.phys_id
                JOIN relation_rating rr ON rr.rel_id = rs.rel_id
                WHERE rs.comp_id = $1
                ORDER BY rr.elo DESC
                LIMIT $2
                "#,
                &[&u128_to_numeric_str(comp_id), &(limit as i64)],
            )
            .await?;
        rows.iter()
            .map(|r| {
                let comp_id = numeric_str_to_u128(r.get("neighbor_comp_id"))?;
                let centroid_raw: Vec<f64> = r.get("centroid");
                Ok(RelationNeighbor {
                    comp_id,
                    centroid: Vector4::new(
                        centroid_raw[0],
                        centroid_raw[1],
                        centroid_raw[2],
                        centroid_raw[3],
                    ),
                    elo: r.get("elo"),
                    observations: r.get::<_, i32>("observations") as u32,
                })
            })
            .collect()
    }

    async fn fetch_composition(&self, comp_id: u128) -> Result<Option<Composition>> {
        let client = self.pool.get().await?;
        let row = client
            .query_opt(
                "SELECT comp_id, phys_id FROM composition WHERE comp_id = $1",
                &[&u128_to_numeric_str(comp_id)],
            )
            .await?;
        row.map(|r| {
            Ok(Composition {
                comp_id: numeric_str_to_u128(r.get("comp_id"))?,
                phys_id: numeric_str_to_u128(r.get("phys_id"))?,
            })
        })
        .transpose()
    }
}

/// `u128` has no native Postgres type; entities are stored as `NUMERIC`
/// serialized through decimal strings, which keeps the 128-bit ids exact
/// without reaching for an extension type.
fn u128_to_numeric_str(v: u128) -> String {
    v.to_string()
}

fn numeric_str_to_u128(s: String) -> Result<u128> {
    s.parse()
        .map_err(|_| SubstrateError::Invariant(format!("stored id is not a valid u128: {s}")))
}

fn row_to_physicality(row: &tokio_postgres::Row) -> Result<Physicality> {
    let phys_id = numeric_str_to_u128(row.get("phys_id"))?;
    let hilbert_index = numeric_str_to_u128(row.get("hilbert_index"))?;
    let centroid_raw: Vec<f64> = row.get("centroid");
    let trajectory_raw: Vec<Vec<f64>> = row.get("trajectory");

    let centroid = nalgebra::Vector4::new(
        centroid_raw[0],
        centroid_raw[1],
        centroid_raw[2],
        centroid_raw[3],
    );
    let trajectory = trajectory_raw
        .into_iter()
        .map(|p| nalgebra::Vector4::new(p[0], p[1], p[2], p[3]))
        .collect();

    Ok(Physicality {
        phys_id,
        hilbert_index,
        centroid,
        trajectory,
    })
}

struct PostgresTransaction {
    client: deadpool_postgres::Object,
}

impl PostgresTransaction {
    async fn new(client: deadpool_postgres::Object) -> Result<Self> {
        client.batch_execute("BEGIN").await?;
        Ok(Self { client })
    }
}

#[async_trait::async_trait]
impl Transaction for PostgresTransaction {
    async fn upsert_physicality(&mut self, phys: &Physicality) -> Result<()> {
        let centroid: Vec<f64> = phys.centroid.iter().copied().collect();
        let trajectory: Vec<Vec<f64>> = phys
            .trajectory
            .iter()
            .map(|p| p.iter().copied().collect())
            .collect();
        self.client
            .execute(
                r#"
                INSERT INTO physicality (phys_id, hilbert_index, centroid, trajectory)
                VALUES ($1, $2, $3, $4)
                ON CONFLICT (phys_id) DO NOTHING
                "#,
                &[
                    &u128_to_numeric_str(phys.phys_id),
                    &u128_to_numeric_str(phys.hilbert_index),
                    &centroid,
                    &trajectory,
                ],
            )
            .await?;
        Ok(())
    }

    async fn upsert_composition(&mut self, comp: &Composition) -> Result<()> {
        self.client
            .execute(
                "INSERT INTO composition (comp_id, phys_id) VALUES ($1, $2) ON CONFLICT (comp_id) DO NOTHING",
                &[
                    &u128_to_numeric_str(comp.comp_id),
                    &u128_to_numeric_str(comp.phys_id),
                ],
            )
            .await?;
        Ok(())
    }

    async fn upsert_composition_sequence(&mut self, seq: &[CompositionSequence]) -> Result<()> {
        for row in seq {
            self.client
                .execute(
                    r#"
                    INSERT INTO composition_sequence (seq_id, comp_id, atom_id, ordinal, occurrences)
                    VALUES ($1, $2, $3, $4, $5)
                    ON CONFLICT (seq_id) DO NOTHING
                    "#,
                    &[
                        &u128_to_numeric_str(row.seq_id),
                        &u128_to_numeric_str(row.comp_id),
                        &u128_to_numeric_str(row.atom_id),
                        &(row.ordinal as i32),
                        &(row.occurrences as i32),
                    ],
                )
                .await?;
        }
        Ok(())
    }

    async fn upsert_relation(&mut self, rel: &Relation) -> Result<()> {
        self.client
            .execute(
                "INSERT INTO relation (rel_id, phys_id) VALUES ($1, $2) ON CONFLICT (rel_id) DO NOTHING",
                &[
                    &u128_to_numeric_str(rel.rel_id),
                    &u128_to_numeric_str(rel.phys_id),
                ],
            )
            .await?;
        Ok(())
    }

    async fn upsert_relation_sequence(&mut self, seq: &[RelationSequence]) -> Result<()> {
        for row in seq {
            self.client
                .execute(
                    r#"
                    INSERT INTO relation_sequence (seq_id, rel_id, comp_id, role)
                    VALUES ($1, $2, $3, $4)
                    ON CONFLICT (seq_id) DO NOTHING
                    "#,
                    &[
                        &u128_to_numeric_str(row.seq_id),
                        &u128_to_numeric_str(row.rel_id),
                        &u128_to_numeric_str(row.comp_id),
                        &(row.role as i32),
                    ],
                )
                .await?;
        }
        Ok(())
    }

    async fn upsert_relation_rating(&mut self, rating: &RelationRating) -> Result<()> {
        self.client
            .execute(
                r#"
                INSERT INTO relation_rating (rel_id, observations, elo, k_factor)
                VALUES ($1, $2, $3, $4)
                ON CONFLICT (rel_id) DO UPDATE SET
                    observations = relation_rating.observations + 1,
                    elo = EXCLUDED.elo,
                    k_factor = EXCLUDED.k_factor
                "#,
                &[
                    &u128_to_numeric_str(rating.rel_id),
                    &(rating.observations as i32),
                    &rating.elo,
                    &rating.k_factor,
                ],
            )
            .await?;
        Ok(())
    }

    async fn upsert_relation_evidence(&mut self, evidence: &RelationEvidence) -> Result<()> {
        self.client
            .execute(
                r#"
                INSERT INTO relation_evidence (evidence_id, content_id, rel_id, positive, base_rating, weight)
                VALUES ($1, $2, $3, $4, $5, $6)
                ON CONFLICT (content_id, rel_id) DO UPDATE SET
                    weight = GREATEST(relation_evidence.weight, EXCLUDED.weight)
                "#,
                &[
                    &u128_to_numeric_str(evidence.evidence_id),
                    &u128_to_numeric_str(evidence.content_id),
                    &u128_to_numeric_str(evidence.rel_id),
                    &evidence.positive,
                    &evidence.base_rating,
                    &evidence.weight,
                ],
            )
            .await?;
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        self.client.batch_execute("COMMIT").await?;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        self.client.batch_execute("ROLLBACK").await?;
        Ok(())
    }
}
