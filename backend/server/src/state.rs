use std::sync::Arc;

use super::{
    config::Config,
    database::{Connector, PostgresConnector},
};

pub struct State {
    pub config: Config,
    pub connector: Arc<dyn Connector>,
}

impl State {
    pub fn new(config: Config) -> Arc<Self> {
        let connector = Arc::new(PostgresConnector::new(&config));

        Self::with_connector(config, connector)
    }

    pub fn with_connector(config: Config, connector: Arc<dyn Connector>) -> Arc<Self> {
        Arc::new(Self { config, connector })
    }
}
