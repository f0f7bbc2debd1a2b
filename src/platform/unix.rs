use std::collections::HashMap;
use std::fs;
use std::os::unix::fs::MetadataExt;
use std::path::Path;
use tracing::debug;

static PASSWD_PATH: &str = "/etc/passwd";

lazy_static::lazy_static! {
    static ref USER_NAMES: HashMap<u32, String> = load_user_names(PASSWD_PATH);
}

/// Name of the user owning `path`, falling back to the numeric uid when the
/// user database has no entry for it.
pub fn owner_name(path: &Path) -> Option<String> {
    let uid = fs::metadata(path).ok()?.uid();
    Some(
        USER_NAMES
            .get(&uid)
            .cloned()
            .unwrap_or_else(|| uid.to_string()),
    )
}

fn load_user_names(passwd: &str) -> HashMap<u32, String> {
    match fs::read_to_string(passwd) {
        Ok(contents) => parse_passwd(&contents),
        Err(e) => {
            debug!("Unable to read {}: {}", passwd, e);
            HashMap::new()
        }
    }
}

fn parse_passwd(contents: &str) -> HashMap<u32, String> {
    contents
        .lines()
        .filter(|line| !line.starts_with('#'))
        .filter_map(|line| {
            let mut fields = line.split(':');
            let name = fields.next()?;
            let uid = fields.nth(1)?.parse::<u32>().ok()?;
            Some((uid, name.to_string()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_passwd() {
        let users = parse_passwd(
            "# comment\nroot:x:0:0:root:/root:/bin/bash\nleon:x:1000:1000::/home/leon:/bin/sh\nbroken\n",
        );
        assert_eq!(users.len(), 2);
        assert_eq!(users[&0], "root");
        assert_eq!(users[&1000], "leon");
    }

    #[test]
    fn test_owner_name_of_missing_file() {
        assert!(owner_name(Path::new("/definitely/not/here")).is_none());
    }
}
