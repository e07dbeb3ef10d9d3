//! Domain operations and result aggregation.

pub mod aggregator;
pub mod task;

pub use aggregator::{AggregationError, assemble_task_detail, decode_rows, decode_templates};
pub use task::{
    CREATE_TASK, CreateTaskParams, GET_TASK, GetTaskParams, LIST_TASKS, LIST_TEMPLATES,
    ListTaskParams, NoParams, task_create, task_get, task_list, task_template_list,
};
