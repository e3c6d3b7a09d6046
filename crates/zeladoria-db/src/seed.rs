use anyhow::Result;
use tracing::info;

use crate::Database;
use crate::models::NewIssueType;
use crate::queries::insert_issue_type;

/// Catalog installed on first start.
pub const DEFAULT_ISSUE_TYPES: &[NewIssueType<'static>] = &[
    NewIssueType { key: "buraco", title: "Buraco na via", category: "Vias", icon: "🕳️" },
    NewIssueType { key: "calcada", title: "Calçada danificada", category: "Vias", icon: "🚧" },
    NewIssueType { key: "luz_queimada", title: "Lâmpada queimada", category: "Iluminação", icon: "💡" },
    NewIssueType { key: "lixo", title: "Lixo acumulado", category: "Limpeza", icon: "🗑️" },
    NewIssueType { key: "entulho", title: "Entulho irregular", category: "Limpeza", icon: "🧱" },
    NewIssueType { key: "arvore", title: "Árvore com risco de queda", category: "Meio ambiente", icon: "🌳" },
    NewIssueType { key: "vazamento", title: "Vazamento de água", category: "Saneamento", icon: "💧" },
    NewIssueType { key: "esgoto", title: "Esgoto a céu aberto", category: "Saneamento", icon: "🚰" },
    NewIssueType { key: "sinalizacao", title: "Sinalização danificada", category: "Trânsito", icon: "🚦" },
];

impl Database {
    /// Installs [`DEFAULT_ISSUE_TYPES`] when the catalog is empty. Returns how
    /// many rows were inserted; zero on every later call.
    pub fn seed_issue_types(&self) -> Result<usize> {
        let inserted = self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let existing: i64 = tx.query_row("SELECT COUNT(*) FROM issue_types", [], |r| r.get(0))?;
            if existing > 0 {
                return Ok(0);
            }
            for entry in DEFAULT_ISSUE_TYPES {
                insert_issue_type(&tx, entry)?;
            }
            tx.commit()?;
            Ok(DEFAULT_ISSUE_TYPES.len())
        })?;

        if inserted > 0 {
            info!("Seeded {} default issue types", inserted);
        }
        Ok(inserted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seeding_twice_does_not_duplicate() {
        let db = Database::open_in_memory().unwrap();

        assert_eq!(db.seed_issue_types().unwrap(), DEFAULT_ISSUE_TYPES.len());
        assert_eq!(db.seed_issue_types().unwrap(), 0);
        assert_eq!(db.count_issue_types().unwrap(), DEFAULT_ISSUE_TYPES.len() as i64);
    }

    #[test]
    fn non_empty_catalog_is_left_alone() {
        let db = Database::open_in_memory().unwrap();
        db.create_issue_type(&NewIssueType {
            key: "pichacao",
            title: "Pichação",
            category: "Limpeza",
            icon: "",
        })
        .unwrap();

        assert_eq!(db.seed_issue_types().unwrap(), 0);
        let keys: Vec<String> = db.list_issue_types().unwrap().into_iter().map(|t| t.key).collect();
        assert_eq!(keys, vec!["pichacao".to_string()]);
    }
}
