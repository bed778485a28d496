//! Store - DuckDB-backed resource storage.
//!
//! Resources live in a single entity/attribute/value table:
//!
//! ```sql
//! resources(resource_type, resource_id, property, value)
//! ```
//!
//! `resource_id` is the JSON encoding of the resource identity (its key
//! property values in key order). The store evaluates `=` comparisons on
//! any property, and conjunctions of them, in SQL.

use std::collections::BTreeMap;
use std::fs;
use std::sync::{Mutex, MutexGuard, PoisonError};

use duckdb::types::Value;
use duckdb::{params, params_from_iter, Connection};

use crate::path::PropertyPath;
use crate::predicate::{as_number, CompareOp, Comparison, Predicate};
use crate::provider::{Backend, PropertyMap};
use crate::resource::{Resource, ResourceType};
use crate::schema::ResourceTypeSchema;
use crate::{Config, Error, Result};

const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS resources (
    resource_type VARCHAR NOT NULL,
    resource_id   VARCHAR NOT NULL,
    property      VARCHAR NOT NULL,
    value         VARCHAR NOT NULL,
    PRIMARY KEY (resource_type, resource_id, property)
);
"#;

/// A DuckDB resource store.
pub struct Store {
    conn: Mutex<Connection>,
}

impl Store {
    /// Create the directory structure and database under the config root.
    pub fn initialize(config: &Config) -> Result<Self> {
        let db_path = config.db_path();
        if db_path.exists() {
            return Err(Error::AlreadyInitialized(config.root.clone()));
        }
        if let Some(parent) = db_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let store = Self::from_connection(Connection::open(&db_path)?)?;
        config.save()?;
        log::info!("initialized store at {}", db_path.display());
        Ok(store)
    }

    /// Open an existing store.
    pub fn open(config: &Config) -> Result<Self> {
        let db_path = config.db_path();
        if !db_path.exists() {
            return Err(Error::NotInitialized(config.root.clone()));
        }
        Self::from_connection(Connection::open(&db_path)?)
    }

    /// A throwaway store that lives only as long as the value.
    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(SCHEMA_SQL)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn connection(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Number of stored resources of `resource_type`.
    pub fn count(&self, resource_type: ResourceType) -> Result<usize> {
        let conn = self.connection();
        let count: i64 = conn.query_row(
            "SELECT COUNT(DISTINCT resource_id) FROM resources WHERE resource_type = ?",
            params![resource_type.as_str()],
            |row| row.get(0),
        )?;
        usize::try_from(count).map_err(|e| Error::Storage(format!("bad resource count: {}", e)))
    }

    /// Run `f` inside a transaction, rolling back on error.
    fn transaction<T>(&self, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        let conn = self.connection();
        conn.execute("BEGIN TRANSACTION", [])?;

        match f(&conn) {
            Ok(value) => {
                conn.execute("COMMIT", [])?;
                Ok(value)
            }
            Err(e) => {
                let _ = conn.execute("ROLLBACK", []);
                Err(e)
            }
        }
    }
}

/// The equalities of a predicate the store evaluates in SQL.
fn equalities(predicate: &Predicate) -> Option<Vec<&Comparison>> {
    match predicate {
        Predicate::Comparison(c) if c.op == CompareOp::Eq => Some(vec![c]),
        Predicate::And(children) => {
            let mut all = Vec::new();
            for child in children {
                all.extend(equalities(child)?);
            }
            Some(all)
        }
        _ => None,
    }
}

fn resource_id(schema: &ResourceTypeSchema, resource: &Resource) -> Result<String> {
    Ok(serde_json::to_string(&schema.identity(resource))?)
}

fn delete_rows(conn: &Connection, resource_type: ResourceType, id: &str) -> Result<usize> {
    Ok(conn.execute(
        "DELETE FROM resources WHERE resource_type = ? AND resource_id = ?",
        params![resource_type.as_str(), id],
    )?)
}

fn insert_rows(conn: &Connection, schema: &ResourceTypeSchema, resource: &Resource) -> Result<()> {
    let resource_type = schema.resource_type().as_str();
    let id = resource_id(schema, resource)?;
    delete_rows(conn, schema.resource_type(), &id)?;

    let mut stmt = conn.prepare("INSERT INTO resources VALUES (?, ?, ?, ?)")?;
    for (property, value) in &resource.properties {
        stmt.execute(params![resource_type, id, property.as_str(), value])?;
    }
    Ok(())
}

fn load_rows(conn: &Connection, resource_type: ResourceType, id: &str) -> Result<Option<Resource>> {
    let mut stmt = conn.prepare(
        "SELECT property, value FROM resources WHERE resource_type = ? AND resource_id = ?",
    )?;
    let rows = stmt.query_map(params![resource_type.as_str(), id], |row| {
        Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
    })?;

    let mut resource = Resource::new(resource_type);
    for row in rows {
        let (property, value) = row?;
        resource.set_property(property, value);
    }
    Ok((!resource.properties.is_empty()).then_some(resource))
}

impl Backend for Store {
    fn can_evaluate(&self, _schema: &ResourceTypeSchema, predicate: &Predicate) -> bool {
        equalities(predicate).is_some()
    }

    fn fetch(&self, schema: &ResourceTypeSchema, predicate: Option<&Predicate>) -> Result<Vec<Resource>> {
        let resource_type = schema.resource_type();
        let mut sql = String::from(
            "SELECT resource_id, property, value FROM resources WHERE resource_type = ?",
        );
        let mut values = vec![Value::Text(resource_type.as_str().to_string())];

        for comparison in predicate.and_then(equalities).unwrap_or_default() {
            sql.push_str(
                " AND resource_id IN (SELECT resource_id FROM resources \
                 WHERE resource_type = ? AND property = ? AND (value = ?",
            );
            values.push(Value::Text(resource_type.as_str().to_string()));
            values.push(Value::Text(comparison.path.as_str().to_string()));
            values.push(Value::Text(comparison.value.clone()));
            // Numeric literals also match equal numbers written differently
            if let Some(number) = as_number(&comparison.value) {
                sql.push_str(" OR TRY_CAST(value AS DOUBLE) = ?");
                values.push(Value::Double(number));
            }
            sql.push_str("))");
        }
        sql.push_str(" ORDER BY resource_id, property");

        let conn = self.connection();
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(values), |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
            ))
        })?;

        let mut resources: BTreeMap<String, Resource> = BTreeMap::new();
        for row in rows {
            let (id, property, value) = row?;
            resources
                .entry(id)
                .or_insert_with(|| Resource::new(resource_type))
                .set_property(PropertyPath::new(property), value);
        }
        log::trace!("{}: fetched {} resource(s)", resource_type, resources.len());
        Ok(resources.into_values().collect())
    }

    fn insert(&self, schema: &ResourceTypeSchema, resources: &[Resource]) -> Result<()> {
        self.transaction(|conn| {
            for resource in resources {
                insert_rows(conn, schema, resource)?;
            }
            Ok(())
        })
    }

    fn update(
        &self,
        schema: &ResourceTypeSchema,
        targets: &[Resource],
        properties: &PropertyMap,
    ) -> Result<usize> {
        self.transaction(|conn| {
            let mut changed = 0;
            for target in targets {
                let id = resource_id(schema, target)?;
                let Some(mut resource) = load_rows(conn, schema.resource_type(), &id)? else {
                    continue;
                };
                resource
                    .properties
                    .extend(properties.iter().map(|(k, v)| (k.clone(), v.clone())));
                // Identity may change with a key property
                let new_id = resource_id(schema, &resource)?;
                if new_id != id && load_rows(conn, schema.resource_type(), &new_id)?.is_some() {
                    return Err(Error::Storage(format!(
                        "{} update would overwrite another resource with key {}",
                        schema.resource_type(),
                        new_id
                    )));
                }
                delete_rows(conn, schema.resource_type(), &id)?;
                insert_rows(conn, schema, &resource)?;
                changed += 1;
            }
            Ok(changed)
        })
    }

    fn remove(&self, schema: &ResourceTypeSchema, targets: &[Resource]) -> Result<usize> {
        self.transaction(|conn| {
            let mut removed = 0;
            for target in targets {
                let id = resource_id(schema, target)?;
                if delete_rows(conn, schema.resource_type(), &id)? > 0 {
                    removed += 1;
                }
            }
            Ok(removed)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::path::FieldSpec;
    use crate::provider::{BackedProvider, ResourceProvider};
    use crate::schema::SchemaRegistry;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn p(path: &str) -> PropertyPath {
        PropertyPath::new(path)
    }

    fn host(name: &str, cpus: &str) -> Resource {
        Resource::new(ResourceType::Host)
            .with_property("Hosts/cluster_name", "c1")
            .with_property("Hosts/host_name", name)
            .with_property("Hosts/cpu_count", cpus)
    }

    fn host_schema() -> ResourceTypeSchema {
        SchemaRegistry::cluster_management()
            .get(ResourceType::Host)
            .unwrap()
            .clone()
    }

    #[test]
    fn test_can_evaluate_equalities() {
        let store = Store::open_in_memory().unwrap();
        let schema = host_schema();
        let a = Predicate::eq(p("Hosts/cpu_count"), "4");
        let b = Predicate::eq(p("Hosts/host_name"), "h1");

        assert!(store.can_evaluate(&schema, &a));
        assert!(store.can_evaluate(&schema, &Predicate::and(a.clone(), b.clone())));
        assert!(!store.can_evaluate(&schema, &Predicate::or(a.clone(), b)));
        assert!(!store.can_evaluate(&schema, &Predicate::not(a)));
        assert!(!store.can_evaluate(
            &schema,
            &Predicate::compare(p("Hosts/cpu_count"), CompareOp::Gt, "4")
        ));
    }

    #[test]
    fn test_insert_and_fetch() {
        let store = Store::open_in_memory().unwrap();
        let schema = host_schema();
        store
            .insert(&schema, &[host("h1", "4"), host("h2", "8"), host("h3", "4")])
            .unwrap();

        assert_eq!(store.count(ResourceType::Host).unwrap(), 3);
        assert_eq!(store.fetch(&schema, None).unwrap().len(), 3);

        let four = Predicate::eq(p("Hosts/cpu_count"), "4.0");
        let fetched = store.fetch(&schema, Some(&four)).unwrap();
        assert_eq!(fetched, vec![host("h1", "4"), host("h3", "4")]);

        let both = Predicate::and(four, Predicate::eq(p("Hosts/host_name"), "h3"));
        assert_eq!(store.fetch(&schema, Some(&both)).unwrap(), vec![host("h3", "4")]);
    }

    #[test]
    fn test_insert_replaces_same_identity() {
        let store = Store::open_in_memory().unwrap();
        let schema = host_schema();
        store.insert(&schema, &[host("h1", "4")]).unwrap();
        store.insert(&schema, &[host("h1", "16")]).unwrap();

        assert_eq!(store.fetch(&schema, None).unwrap(), vec![host("h1", "16")]);
    }

    #[test]
    fn test_update_and_remove() {
        let store = Store::open_in_memory().unwrap();
        let schema = host_schema();
        store.insert(&schema, &[host("h1", "4"), host("h2", "8")]).unwrap();

        let mut props = PropertyMap::new();
        props.insert(p("Hosts/host_name"), "h7".to_string());
        assert_eq!(store.update(&schema, &[host("h1", "4")], &props).unwrap(), 1);

        let fetched = store.fetch(&schema, None).unwrap();
        assert_eq!(fetched, vec![host("h2", "8"), host("h7", "4")]);

        assert_eq!(store.remove(&schema, &[host("h2", "8"), host("nope", "1")]).unwrap(), 1);
        assert_eq!(store.count(ResourceType::Host).unwrap(), 1);
    }

    #[test]
    fn test_update_rejects_key_collision() {
        let store = Store::open_in_memory().unwrap();
        let schema = host_schema();
        store.insert(&schema, &[host("h1", "4"), host("h2", "8")]).unwrap();

        let mut props = PropertyMap::new();
        props.insert(p("Hosts/host_name"), "h2".to_string());
        let err = store.update(&schema, &[host("h1", "4")], &props).unwrap_err();
        assert!(matches!(err, Error::Storage(_)));

        // rolled back: both hosts keep their rows
        let fetched = store.fetch(&schema, None).unwrap();
        assert_eq!(fetched, vec![host("h1", "4"), host("h2", "8")]);
    }

    #[test]
    fn test_initialize_and_reopen() {
        let tmp = TempDir::new().unwrap();
        let config = Config::with_root(tmp.path());

        assert!(matches!(Store::open(&config), Err(Error::NotInitialized(_))));

        let store = Store::initialize(&config).unwrap();
        store.insert(&host_schema(), &[host("h1", "4")]).unwrap();
        drop(store);

        assert!(config.config_path().exists());
        assert!(matches!(
            Store::initialize(&config),
            Err(Error::AlreadyInitialized(_))
        ));

        let reopened = Store::open(&config).unwrap();
        assert_eq!(reopened.count(ResourceType::Host).unwrap(), 1);
    }

    #[test]
    fn test_provider_over_store() {
        let store = Arc::new(Store::open_in_memory().unwrap());
        let provider = BackedProvider::new(host_schema(), Arc::clone(&store));
        store
            .insert(&host_schema(), &[host("h1", "4"), host("h2", "8"), host("h3", "16")])
            .unwrap();

        let pred = crate::query::compile("Hosts/host_name.in(h1,h3)&Hosts/cpu_count>5")
            .unwrap()
            .unwrap();
        let hosts = provider.read(Some(&pred), &FieldSpec::new()).unwrap();
        assert_eq!(hosts, vec![host("h3", "16")]);
    }
}
