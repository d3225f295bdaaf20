use checktree_core::{NodeTree, Status};
use colored::{ColoredString, Colorize};

fn status_label(status: Option<Status>) -> ColoredString {
    match status {
        Some(Status::Pass) => "PASS".green().bold(),
        Some(Status::Fail) => "FAIL".red().bold(),
        None => "----".dimmed(),
    }
}

/// Renders a tree with box-drawing guides, one node per line.
pub fn render_tree(tree: &NodeTree) -> String {
    let mut out = String::new();
    // (node, guide prefix for its children, connector for itself)
    let mut stack: Vec<(&NodeTree, String, &str)> = vec![(tree, String::new(), "")];
    while let Some((node, prefix, connector)) = stack.pop() {
        out.push_str(&prefix);
        out.push_str(connector);
        out.push_str(&format!(
            "[{}] {} {} {}",
            status_label(node.status),
            node.name.bold(),
            format!("#{}", node.id).cyan(),
            node.kind.to_string().dimmed()
        ));
        if let Some(reason) = &node.reason {
            out.push_str(&format!(" - {}", reason.italic()));
        }
        out.push('\n');

        let child_prefix = match connector {
            "" => prefix.clone(),
            "└── " => format!("{prefix}    "),
            _ => format!("{prefix}│   "),
        };
        let last = node.children.len().saturating_sub(1);
        for (idx, child) in node.children.iter().enumerate().rev() {
            let connector = if idx == last { "└── " } else { "├── " };
            stack.push((child, child_prefix.clone(), connector));
        }
    }
    out
}
