mod devices;
mod readings;

pub(crate) use readings::select_device_history;
