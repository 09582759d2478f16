mod helpers;
mod pipeline;
mod reconcile;
