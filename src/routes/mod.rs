pub(crate) mod health;
pub(crate) mod jobs;
pub(crate) mod performance;
pub(crate) mod portfolios;
pub(crate) mod prices;
pub(crate) mod recommendations;
pub(crate) mod stocks;
