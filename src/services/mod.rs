pub mod pod;
pub mod routing;
pub mod site;
