use std::path::Path;

use grouplcm_core::Resource;
use grouplcm_state::StateStore;

/// One line per object: kind, namespace/name, uid, controlling owner.
pub fn format_objects(objects: &[Resource]) -> String {
    let mut out = String::new();
    for obj in objects {
        let owner = obj
            .controller_owner()
            .map(|o| format!("{}/{}", o.kind, o.name))
            .unwrap_or_else(|| "-".to_string());
        out.push_str(&format!(
            "{:<18} {:<48} {:<18} {}\n",
            obj.kind,
            format!("{}/{}", obj.namespace(), obj.name()),
            obj.metadata.uid.as_deref().unwrap_or("-"),
            owner,
        ));
    }
    out
}

pub fn list(data_dir: &Path, kind: Option<&str>, json: bool) -> anyhow::Result<()> {
    let db_path = data_dir.join("grouplcm.redb");
    anyhow::ensure!(db_path.exists(), "no object store at {}", db_path.display());
    let store = StateStore::open(&db_path)?;
    let objects = store.list(kind, None)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&objects)?);
    } else {
        print!("{}", format_objects(&objects));
    }
    Ok(())
}
