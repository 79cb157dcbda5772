//! Contains the formatting logic for rendering tracked stacks as a tree.

use super::SxContext;
use crate::{
    constants::{
        BOTTOM_LEFT_BOX, COLORS, EMPTY_CIRCLE, FILLED_CIRCLE, HORIZONTAL_BOX, LEFT_FORK_BOX,
        VERTICAL_BOX,
    },
    errors::SxResult,
    git::RepositoryExt,
    meta::BranchMeta,
};
use nu_ansi_term::Color;
use std::collections::BTreeMap;
use std::fmt::Write;

impl<'a> SxContext<'a> {
    /// Writes the tree of tracked branches to the given [Write]r, rooted at
    /// the trunk branch.
    pub fn write_tree<W: Write>(&self, w: &mut W) -> SxResult<()> {
        let repo_meta = self.store.read_repo()?;

        // Materialize the forest once; rendering would otherwise re-read
        // records at every level.
        let mut forest = BTreeMap::new();
        for name in self.store.all_branches()? {
            let meta = self.store.read_branch(&name)?;
            forest.insert(name, meta);
        }

        // The trunk has no record of its own; its children are the stack
        // roots that name it as parent.
        let roots: Vec<String> = forest
            .values()
            .filter(|b| b.is_stack_root() && b.parent.name == repo_meta.trunk)
            .map(|b| b.name.clone())
            .collect();

        let checked_out = self.repository.current_branch_name()?;
        let trunk_icon = if checked_out == repo_meta.trunk {
            FILLED_CIRCLE
        } else {
            EMPTY_CIRCLE
        };
        writeln!(
            w,
            "{}",
            COLORS[0].paint(format!("{} {}", trunk_icon, repo_meta.trunk))
        )?;

        let mut roots = roots.iter().peekable();
        while let Some(root) = roots.next() {
            let is_last = roots.peek().is_none();
            self.write_tree_recursive(w, &forest, &checked_out, root, 1, "", is_last)?;
        }
        Ok(())
    }

    fn write_tree_recursive<W: Write>(
        &self,
        w: &mut W,
        forest: &BTreeMap<String, BranchMeta>,
        checked_out: &str,
        branch: &str,
        depth: usize,
        prefix: &str,
        is_last_child: bool,
    ) -> SxResult<()> {
        let Some(current) = forest.get(branch) else {
            return Ok(());
        };

        let connection = format!(
            "{}{}",
            if is_last_child {
                BOTTOM_LEFT_BOX
            } else {
                LEFT_FORK_BOX
            },
            HORIZONTAL_BOX
        );
        let checked_out_icon = if branch == checked_out {
            FILLED_CIRCLE
        } else {
            EMPTY_CIRCLE
        };
        let rendered_branch = COLORS[depth % COLORS.len()]
            .paint(format!("{}{} {}", connection, checked_out_icon, branch));

        let mut annotations = String::new();
        if current.is_merged() {
            annotations.push_str(" (merged)");
        } else if self.needs_sync(current)? {
            annotations.push_str(" (needs sync)");
        }
        if let Some(pr) = &current.pull_request {
            write!(
                annotations,
                " ({})",
                Color::Cyan.italic().paint(format!("#{}", pr.number))
            )?;
        }

        writeln!(w, "{}{}{}", prefix, rendered_branch, annotations)?;

        let mut children = current.children.iter().peekable();
        while let Some(child) = children.next() {
            let is_last = children.peek().is_none();
            let child_prefix = if is_last_child {
                format!("{}  ", prefix)
            } else {
                format!(
                    "{}{} ",
                    prefix,
                    COLORS[depth % COLORS.len()].paint(VERTICAL_BOX.to_string())
                )
            };
            self.write_tree_recursive(
                w,
                forest,
                checked_out,
                child,
                depth + 1,
                child_prefix.as_str(),
                is_last,
            )?;
        }
        Ok(())
    }

    /// Whether a branch's base has fallen behind its parent's tip.
    fn needs_sync(&self, branch: &BranchMeta) -> SxResult<bool> {
        let parent_head = match self.repository.resolve(&branch.parent.name) {
            Ok(head) => head,
            // Parent ref gone (e.g. deleted after merge); the sync engine
            // will sort it out, don't fail the listing.
            Err(_) => return Ok(false),
        };
        let base = self.repository.merge_base_of(&parent_head, &branch.name)?;
        Ok(base.as_deref() != Some(parent_head.as_str()))
    }
}

#[cfg(test)]
mod test {
    use crate::{
        config::SxConfig,
        ctx::SxContext,
        meta::{BranchMeta, MetaStore, ParentMeta, RepoMeta},
    };
    use git2::{Repository, RepositoryInitOptions, Signature};
    use std::path::Path;
    use tempfile::TempDir;

    fn fixture() -> (TempDir, Repository) {
        let tmp = TempDir::new().unwrap();
        let mut opts = RepositoryInitOptions::new();
        opts.initial_head("main");
        let repo = Repository::init_opts(tmp.path(), &opts).unwrap();
        {
            let mut config = repo.config().unwrap();
            config.set_str("user.name", "Test").unwrap();
            config.set_str("user.email", "test@example.com").unwrap();
        }

        std::fs::write(repo.workdir().unwrap().join("a"), "a\n").unwrap();
        let mut index = repo.index().unwrap();
        index.add_path(Path::new("a")).unwrap();
        index.write().unwrap();
        let tree_id = index.write_tree().unwrap();
        let tree = repo.find_tree(tree_id).unwrap();
        let sig = Signature::now("Test", "test@example.com").unwrap();
        repo.commit(Some("HEAD"), &sig, &sig, "Initial commit", &tree, &[])
            .unwrap();
        drop(tree);
        (tmp, repo)
    }

    #[test]
    fn renders_the_tracked_forest() {
        let (_tmp, repo) = fixture();
        let head = repo.head().unwrap().peel_to_commit().unwrap();
        repo.branch("stack-1", &head, false).unwrap();

        let store = MetaStore::create(
            &repo,
            &RepoMeta {
                trunk: "main".to_string(),
                remote: "origin".to_string(),
                ..Default::default()
            },
        )
        .unwrap();
        store
            .write_branch(&BranchMeta {
                name: "stack-1".to_string(),
                parent: ParentMeta {
                    name: "main".to_string(),
                    head: head.id().to_string(),
                    trunk: true,
                },
                ..Default::default()
            })
            .unwrap();

        let ctx = SxContext {
            cfg: SxConfig::default(),
            repository: &repo,
            store,
        };
        let mut buf = String::new();
        ctx.write_tree(&mut buf).unwrap();

        let lines: Vec<&str> = buf.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("main"));
        assert!(lines[1].contains("stack-1"));
        // stack-1 sits on the trunk tip, so it does not need a sync.
        assert!(!buf.contains("needs sync"));
    }
}
