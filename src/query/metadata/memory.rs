//! 内存目录实现
//!
//! 面向嵌入与测试的参考实现：表/视图定义直接注册在内存里。
//! 生产部署里目录由引擎的元数据仓库提供，实现同一个 trait。

use std::collections::HashMap;

use parking_lot::RwLock;

use crate::core::error::MetadataError;
use crate::core::symbol::{ElementSymbol, GroupSymbol};
use crate::core::value::DataType;
use crate::query::command::Command;
use crate::query::metadata::{
    CatalogMetadata, DerivedObjectCache, MaterializationInfo, MetadataResult,
};

/// 物理表定义
#[derive(Debug, Clone)]
pub struct TableDef {
    pub name: String,
    pub model: String,
    pub columns: Vec<(String, DataType)>,
    pub primary_key: Vec<String>,
    pub unique_keys: Vec<Vec<String>>,
    pub cardinality: Option<f64>,
    pub system: bool,
}

impl TableDef {
    pub fn new(name: &str, model: &str, columns: Vec<(&str, DataType)>) -> Self {
        Self {
            name: name.to_string(),
            model: model.to_string(),
            columns: columns
                .into_iter()
                .map(|(n, t)| (n.to_string(), t))
                .collect(),
            primary_key: Vec::new(),
            unique_keys: Vec::new(),
            cardinality: None,
            system: false,
        }
    }

    pub fn with_primary_key(mut self, columns: Vec<&str>) -> Self {
        self.primary_key = columns.into_iter().map(String::from).collect();
        self
    }

    pub fn with_cardinality(mut self, rows: f64) -> Self {
        self.cardinality = Some(rows);
        self
    }

    pub fn as_system_table(mut self) -> Self {
        self.system = true;
        self
    }
}

/// 视图定义
#[derive(Debug, Clone)]
pub struct ViewDef {
    pub name: String,
    pub definition: Command,
    pub materialization: Option<MaterializationInfo>,
}

#[derive(Default)]
struct Registry {
    tables: HashMap<String, TableDef>,
    views: HashMap<String, ViewDef>,
}

/// 内存目录
pub struct InMemoryCatalog {
    registry: RwLock<Registry>,
    cache: DerivedObjectCache,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self {
            registry: RwLock::new(Registry::default()),
            cache: DerivedObjectCache::new(),
        }
    }

    pub fn add_table(&self, table: TableDef) {
        self.registry
            .write()
            .tables
            .insert(table.name.clone(), table);
    }

    pub fn add_view(&self, name: &str, definition: Command) {
        self.registry.write().views.insert(
            name.to_string(),
            ViewDef {
                name: name.to_string(),
                definition,
                materialization: None,
            },
        );
    }

    pub fn add_materialized_view(
        &self,
        name: &str,
        definition: Command,
        target: GroupSymbol,
        enabled: bool,
    ) {
        self.registry.write().views.insert(
            name.to_string(),
            ViewDef {
                name: name.to_string(),
                definition,
                materialization: Some(MaterializationInfo { target, enabled }),
            },
        );
    }
}

impl Default for InMemoryCatalog {
    fn default() -> Self {
        Self::new()
    }
}

impl CatalogMetadata for InMemoryCatalog {
    fn group(&self, name: &str) -> MetadataResult<GroupSymbol> {
        let registry = self.registry.read();
        if registry.tables.contains_key(name) {
            Ok(GroupSymbol::new(name))
        } else if registry.views.contains_key(name) {
            Ok(GroupSymbol::virtual_group(name))
        } else {
            Err(MetadataError::GroupNotFound(name.to_string()))
        }
    }

    fn elements(&self, group: &GroupSymbol) -> MetadataResult<Vec<ElementSymbol>> {
        let registry = self.registry.read();
        let canonical = group.canonical_name();

        if let Some(table) = registry.tables.get(canonical) {
            return Ok(table
                .columns
                .iter()
                .map(|(name, data_type)| {
                    ElementSymbol::with_group(
                        format!("{}.{}", group.name(), name),
                        group.clone(),
                        *data_type,
                    )
                })
                .collect());
        }

        if let Some(view) = registry.views.get(canonical) {
            return Ok(view
                .definition
                .projected_symbols()
                .iter()
                .map(|sym| {
                    ElementSymbol::with_group(
                        format!("{}.{}", group.name(), sym.short_name()),
                        group.clone(),
                        sym.data_type(),
                    )
                })
                .collect());
        }

        Err(MetadataError::GroupNotFound(canonical.to_string()))
    }

    fn model_name(&self, group: &GroupSymbol) -> MetadataResult<Option<String>> {
        let registry = self.registry.read();
        let canonical = group.canonical_name();
        if let Some(table) = registry.tables.get(canonical) {
            Ok(Some(table.model.clone()))
        } else if registry.views.contains_key(canonical) {
            Ok(None)
        } else {
            Err(MetadataError::GroupNotFound(canonical.to_string()))
        }
    }

    fn view_definition(&self, group: &GroupSymbol) -> MetadataResult<Option<Command>> {
        let registry = self.registry.read();
        Ok(registry
            .views
            .get(group.canonical_name())
            .map(|v| v.definition.clone()))
    }

    fn materialization(
        &self,
        group: &GroupSymbol,
    ) -> MetadataResult<Option<MaterializationInfo>> {
        let registry = self.registry.read();
        Ok(registry
            .views
            .get(group.canonical_name())
            .and_then(|v| v.materialization.clone()))
    }

    fn primary_key(&self, group: &GroupSymbol) -> MetadataResult<Option<Vec<ElementSymbol>>> {
        // 锁不可重入，先取出键名再做列解析
        let pk_names = {
            let registry = self.registry.read();
            match registry.tables.get(group.canonical_name()) {
                Some(t) => t.primary_key.clone(),
                None => return Ok(None),
            }
        };
        if pk_names.is_empty() {
            return Ok(None);
        }
        let elements = self.elements(group)?;
        Ok(Some(
            elements
                .into_iter()
                .filter(|e| pk_names.iter().any(|k| k == e.short_name()))
                .collect(),
        ))
    }

    fn unique_keys(&self, group: &GroupSymbol) -> MetadataResult<Vec<Vec<ElementSymbol>>> {
        let mut keys = Vec::new();
        if let Some(pk) = self.primary_key(group)? {
            keys.push(pk);
        }
        let unique_names = {
            let registry = self.registry.read();
            match registry.tables.get(group.canonical_name()) {
                Some(t) => t.unique_keys.clone(),
                None => return Ok(keys),
            }
        };
        if !unique_names.is_empty() {
            let elements = self.elements(group)?;
            for unique in &unique_names {
                keys.push(
                    elements
                        .iter()
                        .filter(|e| unique.iter().any(|k| k == e.short_name()))
                        .cloned()
                        .collect(),
                );
            }
        }
        Ok(keys)
    }

    fn cardinality(&self, group: &GroupSymbol) -> Option<f64> {
        self.registry
            .read()
            .tables
            .get(group.canonical_name())
            .and_then(|t| t.cardinality)
    }

    fn find_group_by_partial_name(&self, partial: &str) -> MetadataResult<Option<GroupSymbol>> {
        let registry = self.registry.read();
        let needle = partial.to_lowercase();
        let matches_name = |name: &str| {
            let lower = name.to_lowercase();
            lower == needle || lower.ends_with(&format!(".{}", needle))
        };

        let mut found: Option<GroupSymbol> = None;
        for name in registry.tables.keys() {
            if matches_name(name) {
                if found.is_some() {
                    // 多义的部分名不做猜测
                    return Ok(None);
                }
                found = Some(GroupSymbol::new(name.clone()));
            }
        }
        for name in registry.views.keys() {
            if matches_name(name) {
                if found.is_some() {
                    return Ok(None);
                }
                found = Some(GroupSymbol::virtual_group(name.clone()));
            }
        }
        Ok(found)
    }

    fn is_system_table(&self, group: &GroupSymbol) -> bool {
        self.registry
            .read()
            .tables
            .get(group.canonical_name())
            .map(|t| t.system)
            .unwrap_or(false)
    }

    fn derived_cache(&self) -> &DerivedObjectCache {
        &self.cache
    }
}
