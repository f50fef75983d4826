use crate::commands::common::{
    format_queue_lines, queue_item_to_list_item, CliContext, QueueListItem,
};
use crate::error::CliError;

pub async fn run_queue(limit: usize, as_json: bool, context: &CliContext) -> Result<(), CliError> {
    let store = shasthyo_core::StoreService::open_path(&context.db_path)?;
    let items = store.list_unresolved(limit)?;

    if as_json {
        let json_items = items
            .iter()
            .map(queue_item_to_list_item)
            .collect::<Vec<QueueListItem>>();
        println!("{}", serde_json::to_string_pretty(&json_items)?);
        return Ok(());
    }

    if items.is_empty() {
        println!("Sync queue is empty.");
        return Ok(());
    }

    for line in format_queue_lines(&items) {
        println!("{line}");
    }

    Ok(())
}
