mod company;
mod resolver;
