
use super::VectorRecord;
use crate::DealError;
use arrow::array::{Array, FixedSizeListArray, Float32Array, Int64Array, RecordBatchIterator, UInt32Array};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use futures::TryStreamExt;
use lancedb::{
    Connection, DistanceType,
    query::{ExecutableQuery, QueryBase},
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error, info};

pub const VECTOR_TABLE: &str = "laptop_vectors";

/// Laptop vectors in a LanceDB table.
///
/// The table never gets an ANN index, so every search is an exhaustive scan
/// and the returned neighbours are exact.
///
/// The table handle is opened once and keeps reading the version it was
/// opened at, so a table swapped in underneath it is never mixed in.
pub struct VectorStore {
    connection: Connection,
    path: PathBuf,
    table_name: String,
    table: Option<lancedb::Table>,
    vector_dimension: Option<usize>,
}

/// One nearest-neighbour hit
#[derive(Debug, Clone, PartialEq)]
pub struct Neighbor {
    pub position: u32,
    pub row_id: i64,
    /// Squared L2 distance as reported by LanceDB
    pub distance: f32,
}

impl VectorStore {
    /// Connect to the vector database rooted at `path`, creating the
    /// directory if needed. An existing table's dimension is detected.
    #[inline]
    pub async fn open(path: &Path) -> Result<Self, DealError> {
        debug!("Opening LanceDB at path: {:?}", path);

        std::fs::create_dir_all(path).map_err(|e| {
            DealError::Database(format!("Failed to create vector database directory: {e}"))
        })?;

        let uri = format!("file://{}", path.display());
        let connection = lancedb::connect(&uri).execute().await.map_err(|e| {
            error!("Failed to connect to LanceDB: {}", e);
            DealError::Database(format!("Failed to connect to LanceDB: {e}"))
        })?;

        let mut store = Self {
            connection,
            path: path.to_path_buf(),
            table_name: VECTOR_TABLE.to_string(),
            table: None,
            vector_dimension: None,
        };

        if store.table_exists().await? {
            let table = store.open_table().await?;
            let dim = Self::detect_vector_dimension(&table).await?;
            debug!("Detected existing vector dimension: {}", dim);
            store.table = Some(table);
            store.vector_dimension = Some(dim);
        }

        Ok(store)
    }

    #[inline]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Dimension of the stored vectors, if the table exists
    #[inline]
    pub fn dimension(&self) -> Option<usize> {
        self.vector_dimension
    }

    async fn table_exists(&self) -> Result<bool, DealError> {
        let table_names = self
            .connection
            .table_names()
            .execute()
            .await
            .map_err(|e| DealError::Database(format!("Failed to list tables: {e}")))?;

        Ok(table_names.contains(&self.table_name))
    }

    /// Detect vector dimension from existing table schema
    async fn detect_vector_dimension(table: &lancedb::Table) -> Result<usize, DealError> {
        let schema = table
            .schema()
            .await
            .map_err(|e| DealError::Database(format!("Failed to get table schema: {e}")))?;

        for field in schema.fields() {
            if field.name() == "vector" {
                if let DataType::FixedSizeList(_, size) = field.data_type() {
                    return usize::try_from(*size)
                        .map_err(|_| DealError::Database(format!("Invalid vector size {size}")));
                }
            }
        }

        Err(DealError::Database(
            "Could not find vector column or determine dimension".to_string(),
        ))
    }

    fn create_schema(vector_dim: i32) -> Arc<Schema> {
        Arc::new(Schema::new(vec![
            Field::new("position", DataType::UInt32, false),
            Field::new("row_id", DataType::Int64, false),
            Field::new(
                "vector",
                DataType::FixedSizeList(
                    Arc::new(Field::new("item", DataType::Float32, false)),
                    vector_dim,
                ),
                false,
            ),
        ]))
    }

    /// Drop any existing table and create an empty one of `vector_dim`
    #[inline]
    pub async fn create_table(&mut self, vector_dim: usize) -> Result<(), DealError> {
        if vector_dim == 0 {
            return Err(DealError::Database(
                "Vector dimension must be greater than 0".to_string(),
            ));
        }
        let size = i32::try_from(vector_dim)
            .map_err(|_| DealError::Database(format!("Vector dimension {vector_dim} too large")))?;

        self.table = None;
        self.vector_dimension = None;
        if self.table_exists().await? {
            info!("Dropping existing {} table", self.table_name);
            self.connection
                .drop_table(&self.table_name)
                .await
                .map_err(|e| DealError::Database(format!("Failed to drop table: {e}")))?;
        }

        let table = self
            .connection
            .create_empty_table(&self.table_name, Self::create_schema(size))
            .execute()
            .await
            .map_err(|e| DealError::Database(format!("Failed to create table: {e}")))?;

        self.table = Some(table);
        self.vector_dimension = Some(vector_dim);
        info!("Created {} table with {} dimensions", self.table_name, vector_dim);
        Ok(())
    }

    /// Append a batch of vectors; every vector must match the table dimension
    #[inline]
    pub async fn store_batch(&mut self, records: &[VectorRecord]) -> Result<(), DealError> {
        if records.is_empty() {
            debug!("No vectors to store");
            return Ok(());
        }

        let vector_dim = self.vector_dimension.ok_or_else(|| {
            DealError::Database("Vector table has not been created".to_string())
        })?;

        if let Some(bad) = records.iter().find(|r| r.dimension() != vector_dim) {
            return Err(DealError::Database(format!(
                "Vector for row {} has dimension {}, expected {}",
                bad.row_id,
                bad.dimension(),
                vector_dim
            )));
        }

        let record_batch = Self::create_record_batch(records, vector_dim)?;
        let table = self.table()?;

        let schema = record_batch.schema();
        let reader = RecordBatchIterator::new(std::iter::once(Ok(record_batch)), schema);
        table
            .add(reader)
            .execute()
            .await
            .map_err(|e| DealError::Database(format!("Failed to insert vectors: {e}")))?;

        debug!("Stored {} vectors", records.len());
        Ok(())
    }

    fn create_record_batch(
        records: &[VectorRecord],
        vector_dim: usize,
    ) -> Result<RecordBatch, DealError> {
        let size = i32::try_from(vector_dim)
            .map_err(|_| DealError::Database(format!("Vector dimension {vector_dim} too large")))?;

        let positions: Vec<u32> = records.iter().map(|r| r.position).collect();
        let row_ids: Vec<i64> = records.iter().map(|r| r.row_id).collect();

        let mut flat_values = Vec::with_capacity(records.len() * vector_dim);
        for record in records {
            flat_values.extend_from_slice(&record.vector);
        }

        let field = Arc::new(Field::new("item", DataType::Float32, false));
        let vector_array =
            FixedSizeListArray::try_new(field, size, Arc::new(Float32Array::from(flat_values)), None)
                .map_err(|e| DealError::Database(format!("Failed to create vector array: {e}")))?;

        let arrays: Vec<Arc<dyn Array>> = vec![
            Arc::new(UInt32Array::from(positions)),
            Arc::new(Int64Array::from(row_ids)),
            Arc::new(vector_array),
        ];

        RecordBatch::try_new(Self::create_schema(size), arrays)
            .map_err(|e| DealError::Database(format!("Failed to create record batch: {e}")))
    }

    /// The `k` stored vectors closest to `query_vector` by L2 distance,
    /// nearest first
    #[inline]
    pub async fn search_nearest(
        &self,
        query_vector: &[f32],
        k: usize,
    ) -> Result<Vec<Neighbor>, DealError> {
        if k == 0 {
            return Ok(Vec::new());
        }

        if let Some(dim) = self.vector_dimension.filter(|&d| d != query_vector.len()) {
            return Err(DealError::Database(format!(
                "Query vector has dimension {}, index has {}",
                query_vector.len(),
                dim
            )));
        }

        debug!("Searching for {} nearest vectors", k);
        let table = self.table()?;

        let mut results = table
            .vector_search(query_vector)
            .map_err(|e| DealError::Database(format!("Failed to create vector search: {e}")))?
            .column("vector")
            .distance_type(DistanceType::L2)
            .limit(k)
            .execute()
            .await
            .map_err(|e| DealError::Database(format!("Failed to execute search: {e}")))?;

        let mut neighbors = Vec::new();
        while let Some(batch) = results
            .try_next()
            .await
            .map_err(|e| DealError::Database(format!("Failed to read result stream: {e}")))?
        {
            neighbors.extend(Self::parse_search_batch(&batch)?);
        }

        neighbors.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        neighbors.truncate(k);

        debug!("Found {} neighbours", neighbors.len());
        Ok(neighbors)
    }

    fn parse_search_batch(batch: &RecordBatch) -> Result<Vec<Neighbor>, DealError> {
        let positions = batch
            .column_by_name("position")
            .ok_or_else(|| DealError::Database("Missing position column".to_string()))?
            .as_any()
            .downcast_ref::<UInt32Array>()
            .ok_or_else(|| DealError::Database("Invalid position column type".to_string()))?;

        let row_ids = batch
            .column_by_name("row_id")
            .ok_or_else(|| DealError::Database("Missing row_id column".to_string()))?
            .as_any()
            .downcast_ref::<Int64Array>()
            .ok_or_else(|| DealError::Database("Invalid row_id column type".to_string()))?;

        let distances = batch
            .column_by_name("_distance")
            .ok_or_else(|| DealError::Database("Missing _distance column".to_string()))?
            .as_any()
            .downcast_ref::<Float32Array>()
            .ok_or_else(|| DealError::Database("Invalid _distance column type".to_string()))?;

        Ok((0..batch.num_rows())
            .map(|row| Neighbor {
                position: positions.value(row),
                row_id: row_ids.value(row),
                distance: if distances.is_null(row) {
                    f32::INFINITY
                } else {
                    distances.value(row)
                },
            })
            .collect())
    }

    /// Every stored (position, row_id) pair, ordered by position
    #[inline]
    pub async fn list_row_ids(&self) -> Result<Vec<(u32, i64)>, DealError> {
        let table = self.table()?;
        let mut results = table
            .query()
            .select(lancedb::query::Select::columns(&["position", "row_id"]))
            .execute()
            .await
            .map_err(|e| DealError::Database(format!("Failed to scan vector table: {e}")))?;

        let mut pairs = Vec::new();
        while let Some(batch) = results
            .try_next()
            .await
            .map_err(|e| DealError::Database(format!("Failed to read scan stream: {e}")))?
        {
            let positions = batch
                .column_by_name("position")
                .and_then(|c| c.as_any().downcast_ref::<UInt32Array>())
                .ok_or_else(|| DealError::Database("Invalid position column".to_string()))?;
            let row_ids = batch
                .column_by_name("row_id")
                .and_then(|c| c.as_any().downcast_ref::<Int64Array>())
                .ok_or_else(|| DealError::Database("Invalid row_id column".to_string()))?;

            pairs.extend((0..batch.num_rows()).map(|i| (positions.value(i), row_ids.value(i))));
        }

        pairs.sort_unstable();
        Ok(pairs)
    }

    /// Number of stored vectors; 0 when the table does not exist
    #[inline]
    pub async fn count(&self) -> Result<u64, DealError> {
        let Some(table) = &self.table else {
            return Ok(0);
        };

        let count = table
            .count_rows(None)
            .await
            .map_err(|e| DealError::Database(format!("Failed to count rows: {e}")))?;

        Ok(count as u64)
    }

    fn table(&self) -> Result<&lancedb::Table, DealError> {
        self.table
            .as_ref()
            .ok_or_else(|| DealError::Database("Vector table has not been created".to_string()))
    }

    async fn open_table(&self) -> Result<lancedb::Table, DealError> {
        self.connection
            .open_table(&self.table_name)
            .execute()
            .await
            .map_err(|e| DealError::Database(format!("Failed to open table: {e}")))
    }
}
